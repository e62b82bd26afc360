// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Test doubles for the lift phase.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::context::{AgentContext, PlanExecutor};
use crate::lift::request::{LiftRequest, LiftRequestType};
use crate::lift::state::{DoorState, LiftMode, LiftState, MotionState};
use crate::lift::LiftTransport;
use crate::DynResult;

use super::controller::ControllerConfig;
use super::data::{LiftDestination, Waypoint};
use super::end_session::EndLiftSession;
use super::policies::{FixedDelay, FixedRewait};
use super::watchdog::{Decision, LiftWatchdog, WatchdogDecision, WatchdogSlot};

pub const AGENT: &str = "agent-1";
pub const LIFT: &str = "LIFT-1";
pub const REWAIT: Duration = Duration::from_secs(5);

pub struct RecordingTransport {
    requests: Mutex<Vec<LiftRequest>>,
    telemetry: Mutex<broadcast::Sender<LiftState>>,
    fail_publishes: AtomicU32,
    fail_subscribes: AtomicU32,
    subscriptions: AtomicU32,
}

impl RecordingTransport {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            requests: Mutex::new(Vec::new()),
            telemetry: Mutex::new(tx),
            fail_publishes: AtomicU32::new(0),
            fail_subscribes: AtomicU32::new(0),
            subscriptions: AtomicU32::new(0),
        }
    }

    pub fn send(&self, state: LiftState) {
        let _ = self.telemetry.lock().unwrap().send(state);
    }

    /// Close every open telemetry stream.
    pub fn drop_streams(&self) {
        let (tx, _) = broadcast::channel(64);
        *self.telemetry.lock().unwrap() = tx;
    }

    pub fn fail_next_publishes(&self, count: u32) {
        self.fail_publishes.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_subscribes(&self, count: u32) {
        self.fail_subscribes.store(count, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<LiftRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Lift calls that were published successfully.
    pub fn calls(&self) -> Vec<LiftRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.request_type == LiftRequestType::Agv)
            .collect()
    }

    pub fn subscriptions(&self) -> u32 {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl LiftTransport for RecordingTransport {
    fn publish(&self, request: &LiftRequest) -> DynResult<()> {
        if take_failure(&self.fail_publishes) {
            return Err("publisher unavailable".into());
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn subscribe(&self, _lift_name: &str) -> DynResult<broadcast::Receiver<LiftState>> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_subscribes) {
            return Err("subscriber unavailable".into());
        }
        Ok(self.telemetry.lock().unwrap().subscribe())
    }
}

/// Answers checks from a script; stays silent once the script runs out.
pub struct ScriptedWatchdog {
    script: Mutex<VecDeque<Decision>>,
    checks: AtomicU32,
    unanswered: Mutex<Vec<(Uuid, WatchdogSlot)>>,
}

impl ScriptedWatchdog {
    pub fn new(script: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            checks: AtomicU32::new(0),
            unanswered: Mutex::new(Vec::new()),
        }
    }

    /// Never answers on its own.
    pub fn silent() -> Self {
        Self::new([])
    }

    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }

    /// Answer the oldest unanswered check.
    pub fn answer_oldest(&self, decision: Decision) -> bool {
        let mut unanswered = self.unanswered.lock().unwrap();
        if unanswered.is_empty() {
            return false;
        }
        let (token, slot) = unanswered.remove(0);
        slot.post(WatchdogDecision { decision, token });
        true
    }

    /// Answer the most recent unanswered check.
    pub fn answer_latest(&self, decision: Decision) -> bool {
        match self.unanswered.lock().unwrap().pop() {
            Some((token, slot)) => {
                slot.post(WatchdogDecision { decision, token });
                true
            }
            None => false,
        }
    }
}

impl LiftWatchdog for ScriptedWatchdog {
    fn check(&self, _lift_name: &str, token: Uuid, slot: WatchdogSlot) {
        self.checks.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(decision) => slot.post(WatchdogDecision { decision, token }),
            None => self.unanswered.lock().unwrap().push((token, slot)),
        }
    }
}

#[derive(Default)]
pub struct RecordingExecutor {
    holds: AtomicU32,
    boarded: Mutex<Vec<LiftDestination>>,
    handoffs: Mutex<Vec<EndLiftSession>>,
}

impl RecordingExecutor {
    pub fn holds(&self) -> u32 {
        self.holds.load(Ordering::SeqCst)
    }

    pub fn boarded(&self) -> Vec<LiftDestination> {
        self.boarded.lock().unwrap().clone()
    }

    pub fn handoff_count(&self) -> usize {
        self.handoffs.lock().unwrap().len()
    }

    pub fn take_handoffs(&self) -> Vec<EndLiftSession> {
        std::mem::take(&mut *self.handoffs.lock().unwrap())
    }
}

impl PlanExecutor for RecordingExecutor {
    fn hold_at(&self, _waypoint: &Waypoint) {
        self.holds.fetch_add(1, Ordering::SeqCst);
    }

    fn board_lift(&self, destination: &LiftDestination) {
        self.boarded.lock().unwrap().push(destination.clone());
    }

    fn hand_off(&self, next: EndLiftSession) {
        self.handoffs.lock().unwrap().push(next);
    }
}

pub struct Fixture {
    pub context: Arc<AgentContext>,
    pub transport: Arc<RecordingTransport>,
    pub executor: Arc<RecordingExecutor>,
}

pub fn fixture(watchdog: Option<Arc<ScriptedWatchdog>>) -> Fixture {
    let transport = Arc::new(RecordingTransport::new());
    let executor = Arc::new(RecordingExecutor::default());
    let mut context = AgentContext::new(AGENT, transport.clone(), executor.clone());
    if let Some(watchdog) = watchdog {
        context = context.with_watchdog(watchdog);
    }
    Fixture {
        context: Arc::new(context),
        transport,
        executor,
    }
}

pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        publish_interval: Duration::from_secs(1),
        retry: Arc::new(FixedDelay::new(3, Duration::from_millis(100))),
        resubscribe: Arc::new(FixedDelay::new(2, Duration::from_millis(100))),
        rewait: Arc::new(FixedRewait::new(REWAIT, 2)),
    }
}

/// Lift parked at `level`, doors open, held by `session`.
pub fn open_at(level: &str, session: &str) -> LiftState {
    LiftState {
        lift_name: LIFT.to_string(),
        available_levels: vec!["L1".into(), "L2".into(), "L3".into()],
        current_level: level.to_string(),
        destination_level: level.to_string(),
        door_state: DoorState::Open,
        motion_state: MotionState::Stopped,
        current_mode: LiftMode::Agv,
        session_id: session.to_string(),
    }
}

/// Lift travelling towards `destination`.
pub fn moving(from: &str, destination: &str, session: &str) -> LiftState {
    LiftState {
        door_state: DoorState::Closed,
        motion_state: MotionState::Up,
        destination_level: destination.to_string(),
        ..open_at(from, session)
    }
}

/// Let spawned tasks run until they are idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
