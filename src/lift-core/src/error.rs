// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::Serialize;
use thiserror::Error;

/// Errors raised while running a lift phase.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LiftError {
    /// Publishing a lift request failed; retried by the controller.
    #[error("lift transport error: {0}")]
    Transport(String),

    /// The telemetry stream closed and could not be re-established.
    #[error("lost telemetry for lift [{lift}] after {attempts} resubscribe attempts")]
    TelemetryLost { lift: String, attempts: u32 },

    /// No valid destination could be derived for the lift call.
    #[error("unresolvable lift destination: {0}")]
    UnresolvedDestination(String),

    /// `begin()` was called on a phase that had already begun.
    #[error("phase [{0}] has already begun")]
    AlreadyBegun(String),

    /// `begin()` was called outside of a tokio runtime.
    #[error("no async runtime to run phase [{0}]")]
    NoRuntime(String),
}

pub type LiftResult<T> = Result<T, LiftError>;

impl LiftError {
    pub fn transport(err: impl ToString) -> Self {
        Self::Transport(err.to_string())
    }

    /// Transient faults are absorbed and retried inside the controller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LiftError::transport("socket closed").is_transient());
        assert!(!LiftError::UnresolvedDestination("empty".into()).is_transient());
        assert!(!LiftError::AlreadyBegun("lift".into()).is_transient());
        assert!(!LiftError::TelemetryLost {
            lift: "LIFT-1".into(),
            attempts: 3
        }
        .is_transient());
    }

    #[test]
    fn test_display() {
        let err = LiftError::TelemetryLost {
            lift: "LIFT-1".into(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "lost telemetry for lift [LIFT-1] after 3 resubscribe attempts"
        );
    }
}
