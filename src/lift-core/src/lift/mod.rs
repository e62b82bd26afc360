// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Lift telemetry and request types, and the transport seam used to reach
//! the lift controller.

use tokio::sync::broadcast;

use crate::DynResult;

pub mod request;
pub mod state;

use request::LiftRequest;
use state::LiftState;

/// Link to the lift controllers of a building.
///
/// Implementations wrap whatever middleware carries lift traffic. Publishing
/// is fire-and-forget; telemetry for every lift arrives on one stream and is
/// filtered by the consumer.
pub trait LiftTransport: Send + Sync {
    /// Publish a lift request. An `Err` means the request never left this
    /// process and may be retried.
    fn publish(&self, request: &LiftRequest) -> DynResult<()>;

    /// Subscribe to lift state telemetry.
    fn subscribe(&self, lift_name: &str) -> DynResult<broadcast::Receiver<LiftState>>;
}
