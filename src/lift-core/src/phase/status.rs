// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Status reporting for a running lift phase.
//!
//! A phase publishes one [`StatusMsg`] per transition or telemetry update.
//! Observers get messages in publish order; the terminal message is always
//! last, sent once, and replayed to anyone who subscribes after the phase
//! has ended.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::lift::state::LiftState;

use super::machine::LiftPhaseState;

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Coarse outcome of a phase, as seen by the task framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Underway,
    /// Still running, but arbitration or transport is misbehaving.
    Degraded,
    Completed,
    Failed,
    Cancelled,
}

impl PhaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for PhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Underway => "underway",
            Self::Degraded => "degraded",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One status update.
#[derive(Debug, Clone, Serialize)]
pub struct StatusMsg {
    pub state: PhaseState,
    pub phase: LiftPhaseState,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lift: Option<LiftState>,
    /// Rewait cycles started so far.
    pub rewaits: u32,
}

impl StatusMsg {
    pub fn new(state: PhaseState, phase: LiftPhaseState, text: impl Into<String>) -> Self {
        Self {
            state,
            phase,
            text: text.into(),
            lift: None,
            rewaits: 0,
        }
    }

    pub fn with_lift(mut self, lift: Option<LiftState>) -> Self {
        self.lift = lift;
        self
    }

    pub fn with_rewaits(mut self, rewaits: u32) -> Self {
        self.rewaits = rewaits;
        self
    }
}

#[derive(Default)]
struct Latest {
    msg: Option<StatusMsg>,
    terminal: bool,
}

struct ChannelInner {
    tx: broadcast::Sender<StatusMsg>,
    latest: Mutex<Latest>,
}

/// Single-producer status broadcast with terminal replay.
#[derive(Clone)]
pub struct StatusChannel {
    inner: Arc<ChannelInner>,
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ChannelInner {
                tx,
                latest: Mutex::new(Latest::default()),
            }),
        }
    }

    /// Publish a status message. Returns false once a terminal message has
    /// already gone out; nothing is published after it.
    pub fn publish(&self, msg: StatusMsg) -> bool {
        let mut latest = self
            .inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if latest.terminal {
            warn!("Dropping status after terminal: {}", msg.text);
            return false;
        }
        latest.terminal = msg.state.is_terminal();
        latest.msg = Some(msg.clone());
        // No receivers is fine; late observers read `latest`.
        let _ = self.inner.tx.send(msg);
        true
    }

    /// Subscribe to status updates.
    pub fn observe(&self) -> StatusStream {
        let latest = self
            .inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if latest.terminal {
            return StatusStream {
                rx: None,
                replay: latest.msg.clone(),
                channel: self.clone(),
                done: false,
            };
        }
        StatusStream {
            rx: Some(self.inner.tx.subscribe()),
            replay: None,
            channel: self.clone(),
            done: false,
        }
    }

    /// Most recent status, if any was published.
    pub fn latest(&self) -> Option<StatusMsg> {
        self.inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .msg
            .clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .terminal
    }

    fn terminal(&self) -> Option<StatusMsg> {
        let latest = self
            .inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if latest.terminal {
            latest.msg.clone()
        } else {
            None
        }
    }
}

/// Observer end of a [`StatusChannel`].
pub struct StatusStream {
    rx: Option<broadcast::Receiver<StatusMsg>>,
    replay: Option<StatusMsg>,
    channel: StatusChannel,
    done: bool,
}

impl StatusStream {
    /// Next status message, or `None` after the terminal message.
    pub async fn recv(&mut self) -> Option<StatusMsg> {
        if self.done {
            return None;
        }
        if let Some(msg) = self.replay.take() {
            self.done = true;
            return Some(msg);
        }
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if msg.state.is_terminal() {
                        self.done = true;
                    }
                    return Some(msg);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Status observer lagged, skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.done = true;
                    return self.channel.terminal();
                }
            }
        }
    }

    /// Drain every remaining message up to and including the terminal one.
    pub async fn collect(mut self) -> Vec<StatusMsg> {
        let mut out = Vec::new();
        while let Some(msg) = self.recv().await {
            out.push(msg);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn underway(text: &str) -> StatusMsg {
        StatusMsg::new(PhaseState::Underway, LiftPhaseState::AwaitingArrival, text)
    }

    fn cancelled() -> StatusMsg {
        StatusMsg::new(PhaseState::Cancelled, LiftPhaseState::Cancelled, "cancelled")
    }

    #[tokio::test]
    async fn test_in_order_delivery_to_many_observers() {
        let channel = StatusChannel::new();
        let first = channel.observe();
        let second = channel.observe();

        assert!(channel.publish(underway("a")));
        assert!(channel.publish(underway("b")));
        assert!(channel.publish(cancelled()));

        for stream in [first, second] {
            let texts: Vec<_> = stream.collect().await.into_iter().map(|m| m.text).collect();
            assert_eq!(texts, vec!["a", "b", "cancelled"]);
        }
    }

    #[tokio::test]
    async fn test_late_observer_gets_terminal_only() {
        let channel = StatusChannel::new();
        channel.publish(underway("a"));
        channel.publish(cancelled());

        let msgs = channel.observe().collect().await;
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].state, PhaseState::Cancelled);
    }

    #[tokio::test]
    async fn test_nothing_after_terminal() {
        let channel = StatusChannel::new();
        let stream = channel.observe();
        assert!(channel.publish(cancelled()));
        assert!(!channel.publish(underway("late")));
        assert!(!channel.publish(cancelled()));

        let msgs = stream.collect().await;
        assert_eq!(msgs.len(), 1);
        assert!(channel.is_terminated());
        assert_eq!(channel.latest().map(|m| m.text), Some("cancelled".to_string()));
    }
}
