//! Shared run flag, end reason and counters. One instance per session, shared by `Arc`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

/// Why a session ended. The first stage to stop the session records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The local user typed the termination token.
    LocalQuit,
    /// The peer sent the termination token.
    RemoteQuit,
    /// Local input reached end of file or failed.
    InputClosed,
    /// The transport failed to receive.
    ReceiveFailure,
    /// Too many consecutive send failures.
    SendFailures,
    /// Ctrl+C or SIGTERM.
    Interrupted,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EndReason::LocalQuit => "local quit",
            EndReason::RemoteQuit => "peer quit",
            EndReason::InputClosed => "input closed",
            EndReason::ReceiveFailure => "receive failure",
            EndReason::SendFailures => "repeated send failures",
            EndReason::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct SessionControl {
    running: AtomicBool,
    reason: OnceLock<EndReason>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            reason: OnceLock::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clear the run flag. Returns true only for the call that actually stopped the session.
    pub fn stop(&self, reason: EndReason) -> bool {
        // Reason is published before the flag so anyone who sees the flag cleared can read it.
        let first = self.reason.set(reason).is_ok();
        self.running.store(false, Ordering::Release);
        if first {
            tracing::debug!(%reason, "session stopping");
        }
        first
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.reason.get().copied()
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-session counters, updated by the stages.
#[derive(Debug, Default)]
pub struct SessionStats {
    sent: AtomicU64,
    send_failures: AtomicU64,
    received: AtomicU64,
    rendered: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of `SessionStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sent: u64,
    pub send_failures: u64,
    pub received: u64,
    pub rendered: u64,
    /// Payloads refused because a queue's pool was exhausted.
    pub dropped: u64,
}

impl SessionStats {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rendered(&self) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            rendered: self.rendered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
