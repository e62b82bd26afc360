// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::{LiftError, LiftResult};

/// Where the agent is relative to the cabin when the phase starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Located {
    Inside,
    Outside,
}

/// Identifier of the task plan a phase belongs to.
pub type PlanId = u64;

/// A pose on a named map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub map_name: String,
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

/// Re-localization target applied once the lift session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub map_name: String,
    pub position: [f64; 3],
    pub graph_index: Option<usize>,
}

/// Traffic schedule itinerary owned by the broader plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub participant: String,
    pub version: u64,
    pub route: Vec<Waypoint>,
}

/// Authoritative lift level to request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftDestination {
    pub lift: String,
    pub level: String,
}

/// Data the dispatcher supplies with a lift request phase.
#[derive(Debug, Clone)]
pub struct PhaseData {
    pub expected_finish: SystemTime,
    pub located: Located,
    pub plan_id: PlanId,
    pub localize_after: Option<Destination>,
    /// Shared with the plan; forwarded to the handoff untouched.
    pub resume_itinerary: Option<Arc<Itinerary>>,
    pub hold_point: Option<Waypoint>,
    pub final_lift_destination: Option<LiftDestination>,
}

impl PhaseData {
    pub fn new(expected_finish: SystemTime, located: Located, plan_id: PlanId) -> Self {
        Self {
            expected_finish,
            located,
            plan_id,
            localize_after: None,
            resume_itinerary: None,
            hold_point: None,
            final_lift_destination: None,
        }
    }

    /// Time left until `expected_finish` as seen at `now`, floored at zero.
    pub fn remaining_at(&self, now: SystemTime) -> Duration {
        self.expected_finish
            .duration_since(now)
            .unwrap_or(Duration::ZERO)
    }

    /// Work out which lift level to request.
    ///
    /// An explicit `final_lift_destination` wins over the nominal
    /// `destination`, but must name the phase's lift.
    pub fn resolve_destination(
        &self,
        lift_name: &str,
        destination: &str,
    ) -> LiftResult<LiftDestination> {
        if let Some(resolved) = &self.final_lift_destination {
            if resolved.lift != lift_name {
                return Err(LiftError::UnresolvedDestination(format!(
                    "final destination names lift [{}] but the phase uses [{}]",
                    resolved.lift, lift_name
                )));
            }
            if resolved.level.trim().is_empty() {
                return Err(LiftError::UnresolvedDestination(format!(
                    "final destination for lift [{}] has an empty level",
                    lift_name
                )));
            }
            return Ok(resolved.clone());
        }

        if destination.trim().is_empty() {
            return Err(LiftError::UnresolvedDestination(format!(
                "no destination level for lift [{}]",
                lift_name
            )));
        }

        Ok(LiftDestination {
            lift: lift_name.to_string(),
            level: destination.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> PhaseData {
        PhaseData::new(SystemTime::UNIX_EPOCH + Duration::from_secs(100), Located::Outside, 1)
    }

    #[test]
    fn test_remaining_floors_at_zero() {
        let data = data();
        let before = SystemTime::UNIX_EPOCH + Duration::from_secs(40);
        let after = SystemTime::UNIX_EPOCH + Duration::from_secs(140);
        assert_eq!(data.remaining_at(before), Duration::from_secs(60));
        assert_eq!(data.remaining_at(after), Duration::ZERO);
    }

    #[test]
    fn test_resolve_from_nominal_destination() {
        let resolved = data().resolve_destination("LIFT-1", "L3").unwrap();
        assert_eq!(resolved.lift, "LIFT-1");
        assert_eq!(resolved.level, "L3");
    }

    #[test]
    fn test_final_destination_wins() {
        let mut data = data();
        data.final_lift_destination = Some(LiftDestination {
            lift: "LIFT-1".into(),
            level: "L3_rear".into(),
        });
        let resolved = data.resolve_destination("LIFT-1", "L3").unwrap();
        assert_eq!(resolved.level, "L3_rear");
    }

    #[test]
    fn test_unresolvable_destinations() {
        assert!(matches!(
            data().resolve_destination("LIFT-1", "  "),
            Err(LiftError::UnresolvedDestination(_))
        ));

        let mut other_lift = data();
        other_lift.final_lift_destination = Some(LiftDestination {
            lift: "LIFT-2".into(),
            level: "L3".into(),
        });
        assert!(other_lift.resolve_destination("LIFT-1", "L3").is_err());
    }
}
