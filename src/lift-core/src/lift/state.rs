// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cabin door state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    #[default]
    Closed,
    Moving,
    Open,
}

/// Cabin motion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    #[default]
    Stopped,
    Up,
    Down,
    Unknown,
}

/// Operating mode reported by the lift controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiftMode {
    #[default]
    Unknown,
    Human,
    Agv,
    Fire,
    Offline,
    Emergency,
}

impl LiftMode {
    /// Fire, offline and emergency modes take the lift out of service.
    pub fn is_out_of_service(&self) -> bool {
        matches!(self, Self::Fire | Self::Offline | Self::Emergency)
    }

    /// Modes in which an agent may ride.
    pub fn is_boardable(&self) -> bool {
        matches!(self, Self::Agv | Self::Human)
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Moving => write!(f, "moving"),
            Self::Open => write!(f, "open"),
        }
    }
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Up => write!(f, "going up"),
            Self::Down => write!(f, "going down"),
            Self::Unknown => write!(f, "unknown motion"),
        }
    }
}

impl fmt::Display for LiftMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Human => write!(f, "human"),
            Self::Agv => write!(f, "agv"),
            Self::Fire => write!(f, "fire"),
            Self::Offline => write!(f, "offline"),
            Self::Emergency => write!(f, "emergency"),
        }
    }
}

/// One telemetry sample from a lift controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftState {
    pub lift_name: String,
    #[serde(default)]
    pub available_levels: Vec<String>,
    pub current_level: String,
    #[serde(default)]
    pub destination_level: String,
    pub door_state: DoorState,
    pub motion_state: MotionState,
    #[serde(default)]
    pub current_mode: LiftMode,
    /// Session currently holding the lift; empty when nobody does.
    #[serde(default)]
    pub session_id: String,
}

impl LiftState {
    /// Lift is parked at `level` with its doors open.
    pub fn is_open_at(&self, level: &str) -> bool {
        self.current_level == level
            && self.door_state == DoorState::Open
            && self.motion_state == MotionState::Stopped
    }

    /// Lift is serving the given session.
    pub fn is_held_by(&self, session_id: &str) -> bool {
        !session_id.is_empty() && self.session_id == session_id
    }

    /// True when `level` is served, or when the lift does not advertise levels.
    pub fn serves_level(&self, level: &str) -> bool {
        self.available_levels.is_empty() || self.available_levels.iter().any(|l| l == level)
    }

    /// Short human-readable summary used in status messages.
    pub fn summary(&self) -> String {
        format!(
            "lift [{}] at [{}], doors {}, {}, mode {}",
            self.lift_name, self.current_level, self.door_state, self.motion_state, self.current_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LiftState {
        LiftState {
            lift_name: "LIFT-1".to_string(),
            available_levels: vec!["L1".to_string(), "L2".to_string()],
            current_level: "L2".to_string(),
            destination_level: "L2".to_string(),
            door_state: DoorState::Open,
            motion_state: MotionState::Stopped,
            current_mode: LiftMode::Agv,
            session_id: "agent-7".to_string(),
        }
    }

    #[test]
    fn test_open_at() {
        let mut state = sample();
        assert!(state.is_open_at("L2"));
        assert!(!state.is_open_at("L1"));

        state.motion_state = MotionState::Down;
        assert!(!state.is_open_at("L2"));
    }

    #[test]
    fn test_session_ownership() {
        let mut state = sample();
        assert!(state.is_held_by("agent-7"));
        assert!(!state.is_held_by("agent-8"));

        state.session_id.clear();
        assert!(!state.is_held_by(""));
    }

    #[test]
    fn test_serves_level() {
        let mut state = sample();
        assert!(state.serves_level("L1"));
        assert!(!state.serves_level("L9"));

        state.available_levels.clear();
        assert!(state.serves_level("L9"));
    }

    #[test]
    fn test_out_of_service_modes() {
        assert!(LiftMode::Fire.is_out_of_service());
        assert!(LiftMode::Emergency.is_out_of_service());
        assert!(!LiftMode::Agv.is_out_of_service());
        assert!(!LiftMode::Human.is_out_of_service());
    }

    #[test]
    fn test_boardable_modes() {
        assert!(LiftMode::Agv.is_boardable());
        assert!(LiftMode::Human.is_boardable());
        assert!(!LiftMode::Unknown.is_boardable());
        assert!(!LiftMode::Offline.is_boardable());
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            sample().summary(),
            "lift [LIFT-1] at [L2], doors open, stopped, mode agv"
        );
    }
}
