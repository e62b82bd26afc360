// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-agent execution context shared by the phases of a plan.

use std::sync::{Arc, Mutex, PoisonError};

use crate::lift::LiftTransport;
use crate::phase::data::{LiftDestination, Waypoint};
use crate::phase::end_session::EndLiftSession;
use crate::phase::watchdog::LiftWatchdog;

/// The agent's plan executor, as seen from a lift phase.
pub trait PlanExecutor: Send + Sync {
    /// Park the agent at `waypoint` while the lift is not ready for it.
    fn hold_at(&self, _waypoint: &Waypoint) {}

    /// Drive the agent into the cabin.
    fn board_lift(&self, destination: &LiftDestination);

    /// Continue the plan with the end-of-session phase.
    fn hand_off(&self, next: EndLiftSession);
}

/// Everything a lift phase needs to know about the agent running it.
pub struct AgentContext {
    name: String,
    requester_id: String,
    transport: Arc<dyn LiftTransport>,
    watchdog: Option<Arc<dyn LiftWatchdog>>,
    executor: Arc<dyn PlanExecutor>,
    boarded: Mutex<Option<LiftDestination>>,
}

impl AgentContext {
    /// Create a context whose lift session id is the agent name.
    pub fn new(
        name: impl Into<String>,
        transport: Arc<dyn LiftTransport>,
        executor: Arc<dyn PlanExecutor>,
    ) -> Self {
        let name = name.into();
        Self {
            requester_id: name.clone(),
            name,
            transport,
            watchdog: None,
            executor,
            boarded: Mutex::new(None),
        }
    }

    pub fn with_requester_id(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = requester_id.into();
        self
    }

    pub fn with_watchdog(mut self, watchdog: Arc<dyn LiftWatchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session id this agent uses in lift requests.
    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    pub fn transport(&self) -> &Arc<dyn LiftTransport> {
        &self.transport
    }

    pub fn watchdog(&self) -> Option<&Arc<dyn LiftWatchdog>> {
        self.watchdog.as_ref()
    }

    pub fn executor(&self) -> &Arc<dyn PlanExecutor> {
        &self.executor
    }

    /// Lift and level the agent last boarded at.
    pub fn boarded_lift(&self) -> Option<LiftDestination> {
        self.boarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_boarded_lift(&self, boarded: Option<LiftDestination>) {
        *self.boarded.lock().unwrap_or_else(PoisonError::into_inner) = boarded;
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("name", &self.name)
            .field("requester_id", &self.requester_id)
            .field("watchdog", &self.watchdog.is_some())
            .finish()
    }
}
