// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod context;
pub mod error;
pub mod lift;
pub mod phase;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use context::{AgentContext, PlanExecutor};
pub use error::{LiftError, LiftResult};
pub use lift::request::{LiftRequest, LiftRequestType};
pub use lift::state::{DoorState, LiftMode, LiftState, MotionState};
pub use lift::LiftTransport;
pub use phase::{ActivePhase, EndLiftSession, Located, PendingPhase, PhaseData};
