// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Plan executor that only logs what an agent would do.

use std::sync::Mutex;

use tracing::{error, info};

use lift_core::phase::{LiftDestination, ResidualData, Waypoint};
use lift_core::{EndLiftSession, PlanExecutor};

/// Logs motion commands and closes the lift session on hand-off.
#[derive(Default)]
pub struct LoggingExecutor {
    residual: Mutex<Option<ResidualData>>,
}

impl LoggingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data left over from the last hand-off.
    pub fn take_residual(&self) -> Option<ResidualData> {
        self.residual
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }
}

impl PlanExecutor for LoggingExecutor {
    fn hold_at(&self, waypoint: &Waypoint) {
        info!(
            "Holding at ({:.2}, {:.2}) on [{}]",
            waypoint.x, waypoint.y, waypoint.map_name
        );
    }

    fn board_lift(&self, destination: &LiftDestination) {
        info!(
            "Boarding lift [{}] bound for [{}]",
            destination.lift, destination.level
        );
    }

    fn hand_off(&self, next: EndLiftSession) {
        info!("{}", next.description());
        let request = next.end_request();
        if let Err(e) = next.context().transport().publish(&request) {
            error!(
                "Failed to end session with lift [{}]: {}",
                request.lift_name, e
            );
        }
        *self
            .residual
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(next.into_residual());
    }
}
