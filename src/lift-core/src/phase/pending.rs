// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::runtime::Handle;
use tracing::error;

use crate::context::AgentContext;
use crate::error::{LiftError, LiftResult};

use super::active::ActivePhase;
use super::controller::ControllerConfig;
use super::data::PhaseData;

/// A lift request phase that has not started yet.
///
/// Creating or inspecting a pending phase does no I/O and starts no timers.
#[derive(Debug)]
pub struct PendingPhase {
    context: Arc<AgentContext>,
    lift_name: String,
    destination: String,
    description: String,
    data: Option<PhaseData>,
    config: ControllerConfig,
}

impl PendingPhase {
    pub fn new(
        context: Arc<AgentContext>,
        lift_name: impl Into<String>,
        destination: impl Into<String>,
        data: PhaseData,
    ) -> Self {
        let lift_name = lift_name.into();
        let destination = destination.into();
        let description = format!("Requesting lift [{}] to [{}]", lift_name, destination);
        Self {
            context,
            lift_name,
            destination,
            description,
            data: Some(data),
            config: ControllerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the phase. The phase data moves into the returned controller;
    /// calling this again is a caller error and returns
    /// [`LiftError::AlreadyBegun`].
    pub fn begin(&mut self) -> LiftResult<ActivePhase> {
        if self.data.is_none() {
            error!("begin() called twice on '{}'", self.description);
            return Err(LiftError::AlreadyBegun(self.description.clone()));
        }
        let runtime =
            Handle::try_current().map_err(|_| LiftError::NoRuntime(self.description.clone()))?;
        let Some(data) = self.data.take() else {
            return Err(LiftError::AlreadyBegun(self.description.clone()));
        };

        Ok(ActivePhase::spawn(
            &runtime,
            Arc::clone(&self.context),
            self.lift_name.clone(),
            self.destination.clone(),
            self.description.clone(),
            data,
            self.config.clone(),
        ))
    }

    pub fn has_begun(&self) -> bool {
        self.data.is_none()
    }

    /// Expected duration of the phase as of now.
    pub fn estimate_phase_duration(&self) -> Duration {
        self.estimate_phase_duration_at(SystemTime::now())
    }

    /// Expected duration of the phase as of `now`, never negative.
    pub fn estimate_phase_duration_at(&self, now: SystemTime) -> Duration {
        self.data
            .as_ref()
            .map(|data| data.remaining_at(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn context(&self) -> &Arc<AgentContext> {
        &self.context
    }

    pub fn lift_name(&self) -> &str {
        &self.lift_name
    }

    pub fn lift_name_mut(&mut self) -> &mut String {
        &mut self.lift_name
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Phase data, until `begin()` takes it.
    pub fn data(&self) -> Option<&PhaseData> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut PhaseData> {
        self.data.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::data::{Itinerary, Located};
    use crate::phase::status::PhaseState;
    use crate::phase::test_support::{fixture, settle};

    fn pending_at(expected_finish: SystemTime) -> PendingPhase {
        let fx = fixture(None);
        PendingPhase::new(
            fx.context,
            "LIFT-1",
            "L2",
            PhaseData::new(expected_finish, Located::Outside, 3),
        )
    }

    #[test]
    fn test_description_computed_once() {
        let mut pending = pending_at(SystemTime::now());
        assert_eq!(pending.description(), "Requesting lift [LIFT-1] to [L2]");
        pending.lift_name_mut().push_str("-B");
        assert_eq!(pending.lift_name(), "LIFT-1-B");
        assert_eq!(pending.description(), "Requesting lift [LIFT-1] to [L2]");
    }

    #[test]
    fn test_duration_is_non_negative_and_non_increasing() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let pending = pending_at(start + Duration::from_secs(30));

        let mut previous = Duration::MAX;
        for step in 0..60 {
            let estimate = pending.estimate_phase_duration_at(start + Duration::from_secs(step));
            assert!(estimate <= previous);
            previous = estimate;
        }
        assert_eq!(previous, Duration::ZERO);
        assert_eq!(
            pending.estimate_phase_duration_at(start),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_pending_does_not_touch_transport() {
        let fx = fixture(None);
        let pending = PendingPhase::new(
            fx.context.clone(),
            "LIFT-1",
            "L2",
            PhaseData::new(SystemTime::now(), Located::Outside, 1),
        );
        let _ = pending.estimate_phase_duration();
        let _ = pending.description();
        assert_eq!(fx.transport.subscriptions(), 0);
        assert!(fx.transport.requests().is_empty());
    }

    #[test]
    fn test_data_is_adjustable_before_begin() {
        let mut pending = pending_at(SystemTime::now());
        let itinerary = Arc::new(Itinerary {
            participant: "agent-1".into(),
            version: 4,
            route: Vec::new(),
        });
        pending.data_mut().unwrap().resume_itinerary = Some(itinerary.clone());
        assert!(Arc::ptr_eq(
            pending.data().unwrap().resume_itinerary.as_ref().unwrap(),
            &itinerary
        ));
    }

    #[test]
    fn test_begin_outside_runtime_keeps_data() {
        let mut pending = pending_at(SystemTime::now());
        assert!(matches!(pending.begin(), Err(LiftError::NoRuntime(_))));
        assert!(!pending.has_begun());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_begin_is_rejected() {
        let fx = fixture(None);
        let mut pending = PendingPhase::new(
            fx.context.clone(),
            "LIFT-1",
            "L2",
            PhaseData::new(SystemTime::now(), Located::Outside, 1),
        );

        let active = pending.begin().expect("first begin");
        assert!(pending.has_begun());
        assert!(pending.data().is_none());
        assert!(matches!(pending.begin(), Err(LiftError::AlreadyBegun(_))));

        settle().await;
        // The first instance is unaffected.
        assert_eq!(fx.transport.calls().len(), 1);
        let status = active.status().expect("status");
        assert_eq!(status.state, PhaseState::Underway);
        assert!(!active.is_finished());
        assert_eq!(active.description(), "Requesting lift [LIFT-1] to [L2]");
    }
}
