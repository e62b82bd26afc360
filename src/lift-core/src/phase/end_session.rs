// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Construction contract of the phase that releases the lift.

use std::sync::Arc;

use crate::context::AgentContext;
use crate::lift::request::LiftRequest;

use super::data::{Destination, Itinerary, LiftDestination, PhaseData, PlanId};

/// What a lift request phase leaves behind for its successor.
#[derive(Debug, Clone)]
pub struct ResidualData {
    pub plan_id: PlanId,
    pub localize_after: Option<Destination>,
    pub resume_itinerary: Option<Arc<Itinerary>>,
}

impl From<PhaseData> for ResidualData {
    fn from(data: PhaseData) -> Self {
        Self {
            plan_id: data.plan_id,
            localize_after: data.localize_after,
            resume_itinerary: data.resume_itinerary,
        }
    }
}

/// Pending end-of-session phase handed to the plan executor.
#[derive(Debug)]
pub struct EndLiftSession {
    context: Arc<AgentContext>,
    lift_name: String,
    destination: LiftDestination,
    residual: ResidualData,
    description: String,
}

impl EndLiftSession {
    pub fn new(
        context: Arc<AgentContext>,
        lift_name: impl Into<String>,
        destination: LiftDestination,
        residual: ResidualData,
    ) -> Self {
        let lift_name = lift_name.into();
        let description = format!(
            "Ending session with lift [{}] at [{}]",
            lift_name, destination.level
        );
        Self {
            context,
            lift_name,
            destination,
            residual,
            description,
        }
    }

    pub fn context(&self) -> &Arc<AgentContext> {
        &self.context
    }

    pub fn lift_name(&self) -> &str {
        &self.lift_name
    }

    pub fn destination(&self) -> &LiftDestination {
        &self.destination
    }

    pub fn residual(&self) -> &ResidualData {
        &self.residual
    }

    /// Give up the residual data, e.g. to resume the itinerary.
    pub fn into_residual(self) -> ResidualData {
        self.residual
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Request that releases the lift session this agent holds.
    pub fn end_request(&self) -> LiftRequest {
        LiftRequest::end_session(
            self.lift_name.clone(),
            self.context.requester_id(),
            self.destination.level.clone(),
        )
    }
}
