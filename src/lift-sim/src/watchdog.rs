// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Scripted boarding arbiter.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use lift_core::phase::{Decision, LiftWatchdog, WatchdogDecision, WatchdogSlot};

use crate::config::WatchdogConfig;

/// Answers each check with the next scripted decision after a fixed delay,
/// then clears every check once the script is used up.
pub struct ScriptedArbiter {
    script: Mutex<VecDeque<Decision>>,
    delay: Duration,
}

impl ScriptedArbiter {
    pub fn new(cfg: &WatchdogConfig) -> Self {
        Self {
            script: Mutex::new(cfg.decisions.iter().copied().collect()),
            delay: Duration::from_millis(cfg.delay_ms),
        }
    }

    fn next_decision(&self) -> Decision {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Decision::Clear)
    }
}

impl LiftWatchdog for ScriptedArbiter {
    fn check(&self, lift_name: &str, token: Uuid, slot: WatchdogSlot) {
        let decision = self.next_decision();
        info!(
            "Watchdog answers {:?} for lift [{}] in {:?}",
            decision, lift_name, self.delay
        );
        let answer = WatchdogDecision { decision, token };
        if self.delay.is_zero() {
            slot.post(answer);
            return;
        }
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            slot.post(answer);
        });
    }
}
