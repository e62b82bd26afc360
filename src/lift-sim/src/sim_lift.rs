// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated lift for development and testing.
//!
//! Holds the cabin in memory, moves one level per travel period and
//! broadcasts telemetry on a fixed tick. No building middleware required.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lift_core::lift::request::{LiftRequest, LiftRequestType};
use lift_core::lift::state::{DoorState, LiftState, MotionState};
use lift_core::lift::LiftTransport;
use lift_core::DynResult;

use crate::config::LiftConfig;

const TELEMETRY_CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Idle,
    DoorsClosing(Duration),
    Travelling(Duration),
    DoorsOpening(Duration),
}

/// Cabin, door and session bookkeeping of one lift.
#[derive(Debug)]
pub struct LiftModel {
    state: LiftState,
    travel_per_level: Duration,
    door_time: Duration,
    motion: Motion,
    open_on_arrival: bool,
}

impl LiftModel {
    pub fn new(cfg: &LiftConfig) -> Self {
        Self {
            state: LiftState {
                lift_name: cfg.name.clone(),
                available_levels: cfg.levels.clone(),
                current_level: cfg.initial_level.clone(),
                destination_level: cfg.initial_level.clone(),
                door_state: DoorState::Closed,
                motion_state: MotionState::Stopped,
                current_mode: cfg.mode,
                session_id: String::new(),
            },
            travel_per_level: Duration::from_millis(cfg.travel_ms_per_level),
            door_time: Duration::from_millis(cfg.door_ms),
            motion: Motion::Idle,
            open_on_arrival: false,
        }
    }

    pub fn state(&self) -> &LiftState {
        &self.state
    }

    fn level_index(&self, level: &str) -> Option<usize> {
        self.state.available_levels.iter().position(|l| l == level)
    }

    /// Apply a request. Returns true when the lift accepted it.
    pub fn apply(&mut self, request: &LiftRequest) -> bool {
        if request.lift_name != self.state.lift_name {
            return false;
        }
        if self.state.current_mode.is_out_of_service() {
            warn!(
                "Lift [{}] is {}; ignoring request from [{}]",
                self.state.lift_name, self.state.current_mode, request.session_id
            );
            return false;
        }

        match request.request_type {
            LiftRequestType::EndSession => {
                if self.state.session_id != request.session_id {
                    debug!(
                        "Session [{}] does not hold lift [{}]",
                        request.session_id, self.state.lift_name
                    );
                    return false;
                }
                info!(
                    "Lift [{}] released by [{}]",
                    self.state.lift_name, request.session_id
                );
                self.state.session_id.clear();
                self.open_on_arrival = false;
                if self.state.door_state != DoorState::Closed && self.motion == Motion::Idle {
                    self.state.door_state = DoorState::Moving;
                    self.motion = Motion::DoorsClosing(self.door_time);
                }
                true
            }
            LiftRequestType::Agv | LiftRequestType::Human => {
                if !self.state.session_id.is_empty() && self.state.session_id != request.session_id
                {
                    debug!(
                        "Lift [{}] held by [{}]; request from [{}] queued out",
                        self.state.lift_name, self.state.session_id, request.session_id
                    );
                    return false;
                }
                if self.level_index(&request.destination_level).is_none() {
                    warn!(
                        "Lift [{}] does not serve level [{}]",
                        self.state.lift_name, request.destination_level
                    );
                    return false;
                }

                if request.request_type == LiftRequestType::Agv {
                    self.state.session_id = request.session_id.clone();
                }
                self.open_on_arrival = request.door_state == DoorState::Open;
                if self.state.destination_level == request.destination_level
                    && self.motion != Motion::Idle
                {
                    return true;
                }
                self.state.destination_level = request.destination_level.clone();
                self.start_towards_destination();
                true
            }
        }
    }

    fn start_towards_destination(&mut self) {
        if self.state.current_level == self.state.destination_level {
            if self.open_on_arrival && self.state.door_state != DoorState::Open {
                self.state.door_state = DoorState::Moving;
                self.motion = Motion::DoorsOpening(self.door_time);
            }
            return;
        }
        match self.state.door_state {
            DoorState::Closed => self.depart(),
            _ => {
                self.state.door_state = DoorState::Moving;
                self.motion = Motion::DoorsClosing(self.door_time);
            }
        }
    }

    fn depart(&mut self) {
        let (Some(from), Some(to)) = (
            self.level_index(&self.state.current_level),
            self.level_index(&self.state.destination_level),
        ) else {
            self.motion = Motion::Idle;
            return;
        };
        self.state.motion_state = if to > from {
            MotionState::Up
        } else {
            MotionState::Down
        };
        self.motion = Motion::Travelling(self.travel_per_level);
    }

    /// Advance the simulation by `elapsed`.
    pub fn advance(&mut self, mut elapsed: Duration) {
        loop {
            let remaining = match &mut self.motion {
                Motion::Idle => return,
                Motion::DoorsClosing(r) | Motion::Travelling(r) | Motion::DoorsOpening(r) => r,
            };
            if elapsed < *remaining {
                *remaining -= elapsed;
                return;
            }
            elapsed -= *remaining;
            self.finish_step();
        }
    }

    fn finish_step(&mut self) {
        match self.motion {
            Motion::Idle => {}
            Motion::DoorsClosing(_) => {
                self.state.door_state = DoorState::Closed;
                self.motion = Motion::Idle;
                if self.state.current_level != self.state.destination_level {
                    self.depart();
                }
            }
            Motion::Travelling(_) => self.arrive_at_next_level(),
            Motion::DoorsOpening(_) => {
                self.state.door_state = DoorState::Open;
                self.motion = Motion::Idle;
            }
        }
    }

    fn arrive_at_next_level(&mut self) {
        let (Some(from), Some(to)) = (
            self.level_index(&self.state.current_level),
            self.level_index(&self.state.destination_level),
        ) else {
            self.motion = Motion::Idle;
            return;
        };
        let next = if to > from { from + 1 } else { from.saturating_sub(1) };
        self.state.current_level = self.state.available_levels[next].clone();

        if next != to {
            self.motion = Motion::Travelling(self.travel_per_level);
            return;
        }
        debug!(
            "Lift [{}] stopped at [{}]",
            self.state.lift_name, self.state.current_level
        );
        self.state.motion_state = MotionState::Stopped;
        if self.open_on_arrival {
            self.state.door_state = DoorState::Moving;
            self.motion = Motion::DoorsOpening(self.door_time);
        } else {
            self.motion = Motion::Idle;
        }
    }
}

/// In-process lift reachable through [`LiftTransport`].
pub struct SimLift {
    name: String,
    requests: mpsc::UnboundedSender<LiftRequest>,
    telemetry: broadcast::Sender<LiftState>,
}

impl SimLift {
    /// Start the lift task. It runs until `shutdown` flips to true.
    pub fn spawn(cfg: &LiftConfig, shutdown: watch::Receiver<bool>) -> (Arc<Self>, JoinHandle<()>) {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (telemetry, _) = broadcast::channel(TELEMETRY_CHANNEL_CAPACITY);
        let model = LiftModel::new(cfg);
        let interval = Duration::from_millis(cfg.telemetry_interval_ms.max(1));

        let handle = tokio::spawn(run_lift(
            model,
            requests_rx,
            telemetry.clone(),
            interval,
            shutdown,
        ));
        let lift = Arc::new(Self {
            name: cfg.name.clone(),
            requests,
            telemetry,
        });
        (lift, handle)
    }
}

impl LiftTransport for SimLift {
    fn publish(&self, request: &LiftRequest) -> DynResult<()> {
        self.requests
            .send(request.clone())
            .map_err(|_| format!("lift [{}] simulator has stopped", self.name).into())
    }

    fn subscribe(&self, lift_name: &str) -> DynResult<broadcast::Receiver<LiftState>> {
        if lift_name != self.name {
            return Err(format!("unknown lift [{}]", lift_name).into());
        }
        Ok(self.telemetry.subscribe())
    }
}

async fn run_lift(
    mut model: LiftModel,
    mut requests: mpsc::UnboundedReceiver<LiftRequest>,
    telemetry: broadcast::Sender<LiftState>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "Lift [{}] simulator started at [{}]",
        model.state().lift_name,
        model.state().current_level
    );
    let mut ticker = tokio::time::interval(interval);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            request = requests.recv() => {
                let Some(request) = request else { break };
                let now = Instant::now();
                model.advance(now - last);
                last = now;
                if model.apply(&request) {
                    let _ = telemetry.send(model.state().clone());
                }
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                model.advance(now - last);
                last = now;
                let _ = telemetry.send(model.state().clone());
            }
        }
    }
    info!("Lift [{}] simulator stopped", model.state().lift_name);
}
