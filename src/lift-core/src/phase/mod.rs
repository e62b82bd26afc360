// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Lift request phase.
//!
//! A [`PendingPhase`] describes an intended lift ride. `begin()` turns it
//! into an [`ActivePhase`] backed by a controller task that calls the lift,
//! waits for it, consults the boarding watchdog and finally hands over to an
//! [`EndLiftSession`].

pub mod active;
pub mod controller;
pub mod data;
pub mod end_session;
pub mod machine;
pub mod pending;
pub mod policies;
pub mod status;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod test_support;

pub use active::ActivePhase;
pub use controller::ControllerConfig;
pub use data::{Destination, Itinerary, LiftDestination, Located, PhaseData, PlanId, Waypoint};
pub use end_session::{EndLiftSession, ResidualData};
pub use machine::{LiftPhaseEvent, LiftPhaseMachine, LiftPhaseState};
pub use pending::PendingPhase;
pub use policies::{ExponentialBackoff, FixedDelay, FixedRewait, RetryPolicy, RewaitPolicy};
pub use status::{PhaseState, StatusChannel, StatusMsg, StatusStream};
pub use watchdog::{Decision, LiftWatchdog, WatchdogDecision, WatchdogSlot};
