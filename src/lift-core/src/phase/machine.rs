// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Lift phase state machine.
//!
//! The machine only decides which transitions are legal. The controller
//! feeds it one event at a time and performs the side effects.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::LiftError;

use super::data::Located;
use super::watchdog::Decision;

/// Events that can trigger state transitions in the lift phase machine.
#[derive(Debug, Clone)]
pub enum LiftPhaseEvent {
    /// Controller task started
    Activated(Located),
    /// Lift call left the process
    CallPublished,
    /// Arbiter answered at the rendezvous
    Decided(Decision),
    /// Rewait timer fired after a hold
    RewaitElapsed,
    /// Agent is in the cabin at the given level
    Boarded(String),
    /// End-of-session phase is being built
    HandoffStarted,
    /// End-of-session phase took over
    HandedOff,
    /// Operator cancelled the phase
    Cancel,
    /// Unrecoverable fault
    Fault(LiftError),
}

/// The current state of the lift phase machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum LiftPhaseState {
    /// Not started
    #[default]
    Idle,
    /// Calling the lift to the agent's level
    CallRequested,
    /// Waiting for the cabin to be ready
    AwaitingArrival,
    /// Lift is here and the arbiter has answered
    Rendezvous(Decision),
    /// Agent is in the cabin
    Boarded { level: String },
    /// Building the end-of-session phase
    HandoffPending,
    /// Control handed to the end-of-session phase
    Finished,
    /// Cancelled by the operator
    Cancelled,
    /// Ended on an unrecoverable fault
    Failed(LiftError),
}

impl fmt::Display for LiftPhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::CallRequested => write!(f, "CallRequested"),
            Self::AwaitingArrival => write!(f, "AwaitingArrival"),
            Self::Rendezvous(Decision::Hold) => write!(f, "Rendezvous(Hold)"),
            Self::Rendezvous(Decision::Clear) => write!(f, "Rendezvous(Clear)"),
            Self::Boarded { .. } => write!(f, "Boarded"),
            Self::HandoffPending => write!(f, "HandoffPending"),
            Self::Finished => write!(f, "Finished"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Failed(err) => write!(f, "Failed({})", err),
        }
    }
}

impl LiftPhaseState {
    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Failed(_))
    }

    /// States in which the agent has not yet committed to boarding.
    pub fn is_before_boarding(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::CallRequested | Self::AwaitingArrival | Self::Rendezvous(_)
        )
    }
}

/// The lift phase state machine that manages state transitions.
#[derive(Debug, Clone)]
pub struct LiftPhaseMachine {
    state: LiftPhaseState,
    transition_count: u64,
    last_transition: Option<Instant>,
}

impl Default for LiftPhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LiftPhaseMachine {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self {
            state: LiftPhaseState::Idle,
            transition_count: 0,
            last_transition: None,
        }
    }

    pub fn state(&self) -> &LiftPhaseState {
        &self.state
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn time_in_state(&self) -> Option<Duration> {
        self.last_transition.map(|t| t.elapsed())
    }

    /// Process an event and potentially transition to a new state.
    /// Returns true if a transition occurred.
    pub fn process_event(&mut self, event: LiftPhaseEvent) -> bool {
        match self.next_state(event) {
            Some(state) => {
                self.state = state;
                self.transition_count += 1;
                self.last_transition = Some(Instant::now());
                true
            }
            None => false,
        }
    }

    fn next_state(&self, event: LiftPhaseEvent) -> Option<LiftPhaseState> {
        use LiftPhaseEvent as E;
        use LiftPhaseState as S;

        match (&self.state, event) {
            (current, _) if current.is_terminal() => None,

            (S::Idle, E::Activated(Located::Outside)) => Some(S::CallRequested),
            (S::Idle, E::Activated(Located::Inside)) => Some(S::AwaitingArrival),

            (S::CallRequested, E::CallPublished) => Some(S::AwaitingArrival),

            (S::AwaitingArrival, E::Decided(decision)) => Some(S::Rendezvous(decision)),

            (S::Rendezvous(Decision::Hold), E::RewaitElapsed) => Some(S::AwaitingArrival),

            (S::Rendezvous(Decision::Clear), E::Boarded(level)) => Some(S::Boarded { level }),

            (S::Boarded { .. }, E::HandoffStarted) => Some(S::HandoffPending),

            (S::HandoffPending, E::HandedOff) => Some(S::Finished),

            (_, E::Cancel) => Some(S::Cancelled),

            (_, E::Fault(err)) => Some(S::Failed(err)),

            // Invalid transition - stay in current state
            _ => None,
        }
    }
}
