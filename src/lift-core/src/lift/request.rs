// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

use super::state::DoorState;

/// Kind of lift request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiftRequestType {
    /// Release the lift session held by `session_id`.
    EndSession,
    /// An autonomous agent requests exclusive use of the lift.
    Agv,
    /// Shared use alongside human passengers.
    Human,
}

/// Outbound request to a lift controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftRequest {
    pub lift_name: String,
    pub session_id: String,
    pub request_type: LiftRequestType,
    pub destination_level: String,
    pub door_state: DoorState,
}

impl LiftRequest {
    /// Call the lift to `level` and hold its doors open there.
    pub fn call(
        lift_name: impl Into<String>,
        session_id: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            lift_name: lift_name.into(),
            session_id: session_id.into(),
            request_type: LiftRequestType::Agv,
            destination_level: level.into(),
            door_state: DoorState::Open,
        }
    }

    /// Release the session, leaving the lift closed at `level`.
    pub fn end_session(
        lift_name: impl Into<String>,
        session_id: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            lift_name: lift_name.into(),
            session_id: session_id.into(),
            request_type: LiftRequestType::EndSession,
            destination_level: level.into(),
            door_state: DoorState::Closed,
        }
    }
}
