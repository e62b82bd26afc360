// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rendezvous point between the lift phase and an external boarding arbiter.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

/// Boarding verdict from the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Agent may board.
    Clear,
    /// Agent must wait; ask again later.
    Hold,
}

/// A decision together with the token of the check it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogDecision {
    pub decision: Decision,
    pub token: Uuid,
}

#[derive(Default)]
struct SlotInner {
    decision: Mutex<Option<WatchdogDecision>>,
    notify: Notify,
}

/// Single-value cell an arbiter writes and the controller drains.
///
/// Writes overwrite any unread decision. Reads clear the slot so each
/// decision is consumed once. Cloning shares the same cell.
#[derive(Clone, Default)]
pub struct WatchdogSlot {
    inner: Arc<SlotInner>,
}

impl WatchdogSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a decision, replacing any unread one, and wake the reader.
    pub fn post(&self, decision: WatchdogDecision) {
        let mut slot = self
            .inner
            .decision
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(decision);
        drop(slot);
        self.inner.notify.notify_one();
    }

    /// Read and clear the pending decision.
    pub fn take(&self) -> Option<WatchdogDecision> {
        self.inner
            .decision
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Drop any unread decision.
    pub fn clear(&self) {
        let _ = self.take();
    }

    /// Whether the unread decision answers the check tagged `token`.
    pub fn holds(&self, token: Uuid) -> bool {
        self.inner
            .decision
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|decision| decision.token == token)
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .decision
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Resolves once a decision has been posted since the last wake-up.
    pub async fn notified(&self) {
        self.inner.notify.notified().await;
    }
}

impl std::fmt::Debug for WatchdogSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogSlot")
            .field("pending", &!self.is_empty())
            .finish()
    }
}

/// External arbiter deciding whether an agent may board a lift.
///
/// `check` must not block: the arbiter answers by posting into `slot`,
/// now or later, echoing `token`.
pub trait LiftWatchdog: Send + Sync {
    fn check(&self, lift_name: &str, token: Uuid, slot: WatchdogSlot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn decision(decision: Decision) -> WatchdogDecision {
        WatchdogDecision {
            decision,
            token: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_take_consumes_once() {
        let slot = WatchdogSlot::new();
        assert!(slot.take().is_none());

        let posted = decision(Decision::Clear);
        slot.post(posted);
        assert_eq!(slot.take(), Some(posted));
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_latest_decision_wins() {
        let slot = WatchdogSlot::new();
        let first = decision(Decision::Hold);
        let second = decision(Decision::Clear);
        slot.post(first);
        slot.post(second);
        assert_eq!(slot.take(), Some(second));
        assert!(slot.is_empty());
    }

    #[test]
    fn test_clones_share_the_cell() {
        let slot = WatchdogSlot::new();
        let arbiter = slot.clone();
        arbiter.post(decision(Decision::Hold));
        assert!(!slot.is_empty());
        slot.clear();
        assert!(arbiter.is_empty());
    }

    #[test]
    fn test_holds_matches_token() {
        let slot = WatchdogSlot::new();
        let posted = decision(Decision::Clear);
        assert!(!slot.holds(posted.token));
        slot.post(posted);
        assert!(slot.holds(posted.token));
        assert!(!slot.holds(Uuid::new_v4()));
        assert!(!slot.is_empty());
    }

    #[tokio::test]
    async fn test_post_wakes_reader() {
        let slot = WatchdogSlot::new();
        let arbiter = slot.clone();
        let writer = std::thread::spawn(move || arbiter.post(decision(Decision::Clear)));
        tokio::time::timeout(Duration::from_secs(1), slot.notified())
            .await
            .expect("notified");
        writer.join().unwrap();
        assert_eq!(slot.take().map(|d| d.decision), Some(Decision::Clear));
    }
}
