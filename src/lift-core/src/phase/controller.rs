// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Lift session controller task.
//!
//! One task per active phase. Telemetry, timers, watchdog wake-ups and
//! control calls are all funnelled through a single `select!` loop, so the
//! controller state is only ever touched from one place.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::AgentContext;
use crate::error::LiftError;
use crate::lift::request::LiftRequest;
use crate::lift::state::LiftState;

use super::data::{LiftDestination, Located, PhaseData, Waypoint};
use super::end_session::EndLiftSession;
use super::machine::{LiftPhaseEvent, LiftPhaseMachine, LiftPhaseState};
use super::policies::{ExponentialBackoff, FixedRewait, RetryPolicy, RewaitPolicy};
use super::status::{PhaseState, StatusChannel, StatusMsg};
use super::watchdog::{Decision, WatchdogDecision, WatchdogSlot};

const CALL_REPUBLISH_INTERVAL: Duration = Duration::from_secs(1);

/// Timing and retry behaviour of a lift session controller.
#[derive(Clone)]
pub struct ControllerConfig {
    /// How often an unacknowledged lift call is republished.
    pub publish_interval: Duration,
    /// Backoff for failed lift call publishes.
    pub retry: Arc<dyn RetryPolicy>,
    /// Backoff for re-establishing lost telemetry.
    pub resubscribe: Arc<dyn RetryPolicy>,
    /// Interval between watchdog re-checks.
    pub rewait: Arc<dyn RewaitPolicy>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            publish_interval: CALL_REPUBLISH_INTERVAL,
            retry: Arc::new(ExponentialBackoff::default()),
            resubscribe: Arc::new(ExponentialBackoff::new(
                3,
                Duration::from_millis(500),
                Duration::from_secs(5),
            )),
            rewait: Arc::new(FixedRewait::default()),
        }
    }
}

impl std::fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("publish_interval", &self.publish_interval)
            .field("retry_attempts", &self.retry.max_attempts())
            .field("resubscribe_attempts", &self.resubscribe.max_attempts())
            .field("rewait_interval", &self.rewait.interval(0))
            .finish()
    }
}

/// Requests from the phase handle to its controller task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Cancel,
    EmergencyAlarm(bool),
}

type Timer = Option<Pin<Box<Sleep>>>;

fn timer(after: Duration) -> Timer {
    Some(Box::pin(tokio::time::sleep(after)))
}

async fn fire(timer: &mut Timer) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn next_update(
    telemetry: &mut Option<broadcast::Receiver<LiftState>>,
) -> Result<LiftState, broadcast::error::RecvError> {
    match telemetry {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Active side of a lift request phase.
pub(crate) struct LiftSessionController {
    context: Arc<AgentContext>,
    lift_name: String,
    destination: String,
    located: Located,
    hold_point: Option<Waypoint>,
    data: Option<PhaseData>,
    config: ControllerConfig,
    machine: LiftPhaseMachine,
    status: StatusChannel,
    cancelled: Arc<AtomicBool>,
    slot: WatchdogSlot,
    resolved: Option<LiftDestination>,
    alarm: bool,
    call_acknowledged: bool,
    publish_failures: u32,
    last_lift_state: Option<LiftState>,
    pending_check: Option<Uuid>,
    unanswered_checks: u32,
    rewaits: u32,
    rewait_timer: Timer,
    publish_timer: Timer,
    resubscribe_timer: Timer,
    resubscribe_attempts: u32,
    telemetry: Option<broadcast::Receiver<LiftState>>,
}

impl LiftSessionController {
    pub(crate) fn new(
        context: Arc<AgentContext>,
        lift_name: String,
        destination: String,
        data: PhaseData,
        config: ControllerConfig,
        status: StatusChannel,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            context,
            lift_name,
            destination,
            located: data.located,
            hold_point: data.hold_point.clone(),
            data: Some(data),
            config,
            machine: LiftPhaseMachine::new(),
            status,
            cancelled,
            slot: WatchdogSlot::new(),
            resolved: None,
            alarm: false,
            call_acknowledged: false,
            publish_failures: 0,
            last_lift_state: None,
            pending_check: None,
            unanswered_checks: 0,
            rewaits: 0,
            rewait_timer: None,
            publish_timer: None,
            resubscribe_timer: None,
            resubscribe_attempts: 0,
            telemetry: None,
        }
    }

    /// Drive the phase until it finishes, fails or is cancelled.
    pub(crate) async fn run(mut self, mut control: mpsc::UnboundedReceiver<Control>) {
        self.activate();

        while !self.machine.state().is_terminal() {
            tokio::select! {
                biased;

                ctrl = control.recv() => match ctrl {
                    Some(Control::Cancel) => self.cancel(),
                    Some(Control::EmergencyAlarm(on)) => self.set_alarm(on),
                    None => {
                        debug!("Phase handle for lift [{}] dropped", self.lift_name);
                        self.cancel();
                    }
                },

                _ = fire(&mut self.rewait_timer) => {
                    self.rewait_timer = None;
                    self.on_rewait_elapsed();
                },

                _ = self.slot.notified() => self.on_watchdog_notified(),

                update = next_update(&mut self.telemetry) => match update {
                    Ok(state) => self.on_lift_state(state),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Lift [{}] telemetry lagged by {} samples", self.lift_name, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => self.on_telemetry_lost(),
                },

                _ = fire(&mut self.publish_timer) => {
                    self.publish_timer = None;
                    self.on_publish_tick();
                },

                _ = fire(&mut self.resubscribe_timer) => {
                    self.resubscribe_timer = None;
                    self.resubscribe();
                },
            }
        }

        self.release();
        debug!(
            "Lift [{}] controller exiting in {} after {} transitions",
            self.lift_name,
            self.machine.state(),
            self.machine.transition_count()
        );
    }

    /// Checks the shared cancellation flag before any callback acts.
    fn live(&mut self) -> bool {
        if self.machine.state().is_terminal() {
            return false;
        }
        if self.cancelled.load(Ordering::SeqCst) {
            self.cancel();
            return false;
        }
        true
    }

    fn activate(&mut self) {
        if !self.live() {
            return;
        }
        info!(
            "Agent [{}] requesting lift [{}] to [{}] ({:?})",
            self.context.name(),
            self.lift_name,
            self.destination,
            self.located
        );

        let resolved = match self.data.as_ref() {
            Some(data) => data.resolve_destination(&self.lift_name, &self.destination),
            None => Err(LiftError::UnresolvedDestination(
                "phase data already handed off".to_string(),
            )),
        };
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                self.fail(err);
                return;
            }
        };
        self.resolved = Some(resolved.clone());

        match self.context.transport().subscribe(&self.lift_name) {
            Ok(rx) => self.telemetry = Some(rx),
            Err(err) => {
                warn!(
                    "Subscribing to lift [{}] telemetry failed: {}",
                    self.lift_name, err
                );
                self.schedule_resubscribe();
                if !self.live() {
                    return;
                }
            }
        }

        self.machine
            .process_event(LiftPhaseEvent::Activated(self.located));
        match self.located {
            Located::Outside => {
                self.publish_status(
                    PhaseState::Underway,
                    format!(
                        "Requesting lift [{}] to [{}]",
                        self.lift_name, resolved.level
                    ),
                );
                if let Some(hold_point) = &self.hold_point {
                    self.context.executor().hold_at(hold_point);
                }
                self.publish_call();
            }
            Located::Inside => {
                self.publish_status(
                    PhaseState::Underway,
                    format!(
                        "Riding lift [{}] to [{}]",
                        self.lift_name, resolved.level
                    ),
                );
            }
        }
    }

    fn publish_call(&mut self) {
        if self.alarm || self.located == Located::Inside {
            return;
        }
        let Some(resolved) = self.resolved.as_ref() else {
            return;
        };
        let request = LiftRequest::call(
            self.lift_name.clone(),
            self.context.requester_id(),
            resolved.level.clone(),
        );

        match self.context.transport().publish(&request) {
            Ok(()) => {
                debug!(
                    "Published call for lift [{}] to [{}]",
                    request.lift_name, request.destination_level
                );
                self.publish_failures = 0;
                if self.machine.process_event(LiftPhaseEvent::CallPublished) {
                    self.publish_status(
                        PhaseState::Underway,
                        format!(
                            "Waiting for lift [{}] to arrive at [{}]",
                            self.lift_name, request.destination_level
                        ),
                    );
                }
                if !self.call_acknowledged {
                    self.publish_timer = timer(self.config.publish_interval);
                }
            }
            Err(err) => {
                let err = LiftError::transport(err);
                let attempt = self.publish_failures;
                self.publish_failures = self.publish_failures.saturating_add(1);
                if self.config.retry.should_retry(attempt, &err) {
                    warn!(
                        "Lift [{}] call attempt {} failed: {}",
                        self.lift_name,
                        attempt + 1,
                        err
                    );
                    self.publish_timer = timer(self.config.retry.delay(attempt));
                } else {
                    self.publish_status(
                        PhaseState::Degraded,
                        format!(
                            "Unable to call lift [{}] after {} attempts: {}",
                            self.lift_name, self.publish_failures, err
                        ),
                    );
                    self.publish_timer = timer(self.config.publish_interval);
                }
            }
        }
    }

    fn on_publish_tick(&mut self) {
        if !self.live() || self.alarm || self.call_acknowledged {
            return;
        }
        if self.located == Located::Outside && self.machine.state().is_before_boarding() {
            self.publish_call();
        }
    }

    fn on_lift_state(&mut self, state: LiftState) {
        if !self.live() || state.lift_name != self.lift_name {
            return;
        }
        self.resubscribe_attempts = 0;

        let Some(resolved) = self.resolved.clone() else {
            return;
        };
        if !state.serves_level(&resolved.level) {
            self.last_lift_state = Some(state);
            self.fail(LiftError::UnresolvedDestination(format!(
                "lift [{}] does not serve level [{}]",
                self.lift_name, resolved.level
            )));
            return;
        }

        if self.located == Located::Outside
            && !self.call_acknowledged
            && state.is_held_by(self.context.requester_id())
        {
            debug!(
                "Lift [{}] acknowledged session [{}]",
                self.lift_name,
                self.context.requester_id()
            );
            self.call_acknowledged = true;
            self.publish_timer = None;
        }

        let text = if state.current_mode.is_out_of_service() {
            format!(
                "Lift [{}] is out of service ({}); waiting",
                self.lift_name, state.current_mode
            )
        } else {
            format!("Waiting for {}", state.summary())
        };
        self.last_lift_state = Some(state);
        self.publish_status(PhaseState::Underway, text);

        self.evaluate_rendezvous();
    }

    fn has_arrived(&self, state: &LiftState, level: &str) -> bool {
        if !state.current_mode.is_boardable() || !state.is_open_at(level) {
            return false;
        }
        match self.located {
            Located::Outside => state.is_held_by(self.context.requester_id()),
            Located::Inside => true,
        }
    }

    /// Decide at the lift door. Only acts in `AwaitingArrival` with the
    /// alarm off and the cabin ready.
    fn evaluate_rendezvous(&mut self) {
        if self.alarm || self.machine.state() != &LiftPhaseState::AwaitingArrival {
            return;
        }
        let (Some(state), Some(resolved)) = (self.last_lift_state.as_ref(), self.resolved.as_ref())
        else {
            return;
        };
        if !self.has_arrived(state, &resolved.level) {
            return;
        }

        // The watchdog only arbitrates entry; an agent already inside
        // proceeds on arrival.
        let watchdog = match self.context.watchdog() {
            Some(watchdog) if self.located == Located::Outside => Some(Arc::clone(watchdog)),
            _ => None,
        };
        let Some(watchdog) = watchdog else {
            self.on_decision(Decision::Clear);
            return;
        };

        if let Some(decision) = self.take_decision() {
            self.on_decision(decision.decision);
            return;
        }
        if self.pending_check.is_some() {
            return;
        }

        let token = Uuid::new_v4();
        self.pending_check = Some(token);
        self.publish_status(
            PhaseState::Underway,
            format!(
                "Lift [{}] has arrived; waiting for watchdog clearance",
                self.lift_name
            ),
        );
        watchdog.check(&self.lift_name, token, self.slot.clone());

        // Arbiters may answer synchronously.
        if let Some(decision) = self.take_decision() {
            self.on_decision(decision.decision);
            return;
        }
        self.rewait_timer = timer(self.config.rewait.interval(self.rewaits));
    }

    /// Consume the slot, keeping only an answer to the outstanding check.
    fn take_decision(&mut self) -> Option<WatchdogDecision> {
        let decision = self.slot.take()?;
        if self.pending_check != Some(decision.token) {
            debug!(
                "Discarding stale watchdog decision {:?} for lift [{}]",
                decision.decision, self.lift_name
            );
            return None;
        }
        self.pending_check = None;
        self.unanswered_checks = 0;
        Some(decision)
    }

    fn on_watchdog_notified(&mut self) {
        if !self.live() || self.pending_check.is_none() {
            return;
        }
        self.evaluate_rendezvous();
    }

    fn on_decision(&mut self, decision: Decision) {
        if !self
            .machine
            .process_event(LiftPhaseEvent::Decided(decision))
        {
            return;
        }
        match decision {
            Decision::Hold => {
                self.rewaits += 1;
                let interval = self.config.rewait.interval(self.rewaits - 1);
                self.publish_status(
                    PhaseState::Underway,
                    format!(
                        "Watchdog is holding entry to lift [{}]; re-checking in {:?}",
                        self.lift_name, interval
                    ),
                );
                if let Some(hold_point) = &self.hold_point {
                    self.context.executor().hold_at(hold_point);
                }
                self.rewait_timer = timer(interval);
            }
            Decision::Clear => {
                self.rewait_timer = None;
                self.publish_status(
                    PhaseState::Underway,
                    format!("Watchdog cleared entry to lift [{}]", self.lift_name),
                );
                self.board();
            }
        }
    }

    fn on_rewait_elapsed(&mut self) {
        if !self.live() {
            return;
        }
        match self.machine.state() {
            LiftPhaseState::Rendezvous(Decision::Hold) => {
                self.slot.clear();
                self.pending_check = None;
                self.machine.process_event(LiftPhaseEvent::RewaitElapsed);
                self.publish_status(
                    PhaseState::Underway,
                    format!(
                        "Rewait #{} over; asking watchdog again about lift [{}]",
                        self.rewaits, self.lift_name
                    ),
                );
                self.evaluate_rendezvous();
            }
            LiftPhaseState::AwaitingArrival if self.pending_check.is_some() => {
                // Answered while the cabin was not ready; the next arrival uses it.
                if self.pending_check.is_some_and(|token| self.slot.holds(token)) {
                    self.unanswered_checks = 0;
                    return;
                }
                self.slot.clear();
                self.pending_check = None;
                if self.alarm {
                    return;
                }
                self.unanswered_checks += 1;
                if self.unanswered_checks >= self.config.rewait.degraded_after() {
                    self.publish_status(
                        PhaseState::Degraded,
                        format!(
                            "Watchdog has not answered {} checks for lift [{}]",
                            self.unanswered_checks, self.lift_name
                        ),
                    );
                } else {
                    debug!(
                        "Watchdog check for lift [{}] went unanswered",
                        self.lift_name
                    );
                }
                self.evaluate_rendezvous();
            }
            _ => {}
        }
    }

    fn board(&mut self) {
        let Some(resolved) = self.resolved.clone() else {
            return;
        };
        if self.located == Located::Outside {
            self.context.executor().board_lift(&resolved);
        }
        let level = self
            .last_lift_state
            .as_ref()
            .map(|s| s.current_level.clone())
            .unwrap_or_else(|| resolved.level.clone());
        self.context.set_boarded_lift(Some(LiftDestination {
            lift: self.lift_name.clone(),
            level: level.clone(),
        }));
        self.machine
            .process_event(LiftPhaseEvent::Boarded(level.clone()));
        self.publish_status(
            PhaseState::Underway,
            format!("Boarded lift [{}] at [{}]", self.lift_name, level),
        );
        self.hand_off(resolved);
    }

    fn hand_off(&mut self, resolved: LiftDestination) {
        self.machine.process_event(LiftPhaseEvent::HandoffStarted);
        self.publish_status(
            PhaseState::Underway,
            format!("Handing lift [{}] over to end of session", self.lift_name),
        );
        self.release();

        let Some(data) = self.data.take() else {
            self.fail(LiftError::UnresolvedDestination(
                "phase data already handed off".to_string(),
            ));
            return;
        };
        let next = EndLiftSession::new(
            Arc::clone(&self.context),
            self.lift_name.clone(),
            resolved.clone(),
            data.into(),
        );
        info!("{}", next.description());
        self.context.executor().hand_off(next);

        self.machine.process_event(LiftPhaseEvent::HandedOff);
        self.publish_status(
            PhaseState::Completed,
            format!(
                "Lift [{}] is ready at [{}]",
                self.lift_name, resolved.level
            ),
        );
    }

    fn set_alarm(&mut self, on: bool) {
        if !self.live() || self.alarm == on {
            return;
        }
        self.alarm = on;
        if on {
            warn!(
                "Emergency alarm raised; holding lift [{}] phase in {}",
                self.lift_name,
                self.machine.state()
            );
            self.publish_status(
                PhaseState::Underway,
                format!("Emergency alarm: holding before lift [{}]", self.lift_name),
            );
            return;
        }

        info!("Emergency alarm cleared for lift [{}]", self.lift_name);
        self.publish_status(
            PhaseState::Underway,
            format!("Emergency alarm cleared; resuming lift [{}]", self.lift_name),
        );
        match self.machine.state() {
            LiftPhaseState::CallRequested => self.publish_call(),
            LiftPhaseState::AwaitingArrival => {
                if !self.call_acknowledged && self.publish_timer.is_none() {
                    self.publish_call();
                }
                self.evaluate_rendezvous();
            }
            _ => {}
        }
    }

    fn on_telemetry_lost(&mut self) {
        warn!("Telemetry stream for lift [{}] closed", self.lift_name);
        self.telemetry = None;
        if self.live() {
            self.schedule_resubscribe();
        }
    }

    fn schedule_resubscribe(&mut self) {
        let attempt = self.resubscribe_attempts;
        let err = LiftError::transport("telemetry stream unavailable");
        if self.config.resubscribe.should_retry(attempt, &err) {
            self.resubscribe_attempts += 1;
            self.resubscribe_timer = timer(self.config.resubscribe.delay(attempt));
        } else {
            self.fail(LiftError::TelemetryLost {
                lift: self.lift_name.clone(),
                attempts: attempt,
            });
        }
    }

    fn resubscribe(&mut self) {
        if !self.live() {
            return;
        }
        match self.context.transport().subscribe(&self.lift_name) {
            Ok(rx) => {
                info!(
                    "Resubscribed to lift [{}] telemetry (attempt {})",
                    self.lift_name, self.resubscribe_attempts
                );
                self.telemetry = Some(rx);
            }
            Err(err) => {
                warn!(
                    "Resubscribing to lift [{}] telemetry failed: {}",
                    self.lift_name, err
                );
                self.schedule_resubscribe();
            }
        }
    }

    fn cancel(&mut self) {
        if !self.machine.process_event(LiftPhaseEvent::Cancel) {
            return;
        }
        self.release();
        info!("Cancelled request for lift [{}]", self.lift_name);
        self.publish_status(
            PhaseState::Cancelled,
            format!("Cancelled request for lift [{}]", self.lift_name),
        );
    }

    fn fail(&mut self, err: LiftError) {
        if !self
            .machine
            .process_event(LiftPhaseEvent::Fault(err.clone()))
        {
            return;
        }
        self.release();
        error!("Lift [{}] phase failed: {}", self.lift_name, err);
        self.publish_status(PhaseState::Failed, err.to_string());
    }

    /// Drop timers and the telemetry subscription.
    fn release(&mut self) {
        self.rewait_timer = None;
        self.publish_timer = None;
        self.resubscribe_timer = None;
        self.telemetry = None;
        self.pending_check = None;
        self.slot.clear();
    }

    fn publish_status(&self, state: PhaseState, text: String) {
        debug!("[{}] {}: {}", self.lift_name, self.machine.state(), text);
        let msg = StatusMsg::new(state, self.machine.state().clone(), text)
            .with_lift(self.last_lift_state.clone())
            .with_rewaits(self.rewaits);
        self.status.publish(msg);
    }
}
