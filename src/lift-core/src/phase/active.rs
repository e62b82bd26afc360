// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::context::AgentContext;

use super::controller::{Control, ControllerConfig, LiftSessionController};
use super::data::PhaseData;
use super::status::{StatusChannel, StatusMsg, StatusStream};

/// Handle to a running lift request phase.
///
/// Dropping the handle cancels the phase.
pub struct ActivePhase {
    lift_name: String,
    description: String,
    expected_finish: SystemTime,
    status: StatusChannel,
    control: mpsc::UnboundedSender<Control>,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ActivePhase {
    pub(crate) fn spawn(
        runtime: &Handle,
        context: Arc<AgentContext>,
        lift_name: String,
        destination: String,
        description: String,
        data: PhaseData,
        config: ControllerConfig,
    ) -> Self {
        let status = StatusChannel::new();
        let cancelled = Arc::new(AtomicBool::new(false));
        let (control, control_rx) = mpsc::unbounded_channel();
        let expected_finish = data.expected_finish;

        let controller = LiftSessionController::new(
            context,
            lift_name.clone(),
            destination,
            data,
            config,
            status.clone(),
            Arc::clone(&cancelled),
        );
        let task = runtime.spawn(controller.run(control_rx));

        Self {
            lift_name,
            description,
            expected_finish,
            status,
            control,
            cancelled,
            task,
        }
    }

    /// Subscribe to status updates.
    pub fn observe(&self) -> StatusStream {
        self.status.observe()
    }

    /// Most recent status update.
    pub fn status(&self) -> Option<StatusMsg> {
        self.status.latest()
    }

    /// Time left until the phase's expected finish; reporting only.
    pub fn estimate_remaining_time(&self) -> Duration {
        self.expected_finish
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    /// Raise or clear the emergency alarm.
    pub fn emergency_alarm(&self, on: bool) {
        if self.control.send(Control::EmergencyAlarm(on)).is_err() {
            debug!(
                "Emergency alarm for finished lift [{}] phase ignored",
                self.lift_name
            );
        }
    }

    /// Cancel the phase. Repeated calls have no further effect.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.control.send(Control::Cancel);
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn lift_name(&self) -> &str {
        &self.lift_name
    }

    /// Controller task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl std::fmt::Debug for ActivePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivePhase")
            .field("lift_name", &self.lift_name)
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
