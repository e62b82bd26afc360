// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Lift phase policies for retry and rewait behavior.
//!
//! This module provides configurable policies that control how the lift
//! controller retries transport failures and how long it waits before asking
//! the watchdog again.

use std::time::Duration;

use crate::error::LiftError;

/// Policy for retrying failed operations.
pub trait RetryPolicy: Send + Sync {
    /// Determine if the operation should be retried.
    fn should_retry(&self, attempt: u32, error: &LiftError) -> bool;

    /// Get the delay before the next retry attempt.
    fn delay(&self, attempt: u32) -> Duration;

    /// Get the maximum number of attempts allowed.
    fn max_attempts(&self) -> u32;
}

/// Exponential backoff retry policy.
///
/// Delays increase exponentially with each retry attempt,
/// up to a configured maximum delay.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Defaults for republishing lift calls.
    pub fn default_lift() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::default_lift()
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, attempt: u32, error: &LiftError) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        error.is_transient()
    }

    fn delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(multiplier);
        delay.min(self.max_delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Fixed delay retry policy.
///
/// Uses a constant delay between retry attempts.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    max_attempts: u32,
    delay: Duration,
}

impl FixedDelay {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl RetryPolicy for FixedDelay {
    fn should_retry(&self, attempt: u32, error: &LiftError) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }

    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Policy for re-checking the watchdog after a hold or an unanswered check.
pub trait RewaitPolicy: Send + Sync {
    /// Delay before the given rewait cycle (0-based) ends.
    fn interval(&self, cycle: u32) -> Duration;

    /// Consecutive unanswered checks after which arbitration is reported as
    /// degraded.
    fn degraded_after(&self) -> u32;
}

/// Constant rewait interval.
#[derive(Debug, Clone)]
pub struct FixedRewait {
    interval: Duration,
    degraded_after: u32,
}

impl FixedRewait {
    pub fn new(interval: Duration, degraded_after: u32) -> Self {
        Self {
            interval,
            degraded_after: degraded_after.max(1),
        }
    }
}

impl Default for FixedRewait {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 3)
    }
}

impl RewaitPolicy for FixedRewait {
    fn interval(&self, _cycle: u32) -> Duration {
        self.interval
    }

    fn degraded_after(&self) -> u32 {
        self.degraded_after
    }
}
