//! ACK sub-protocol (spec §4.2): "the handler waits for a cmdRsp whose cmd
//! field matches the request, for a fixed ACK timeout (implementation-
//! defined constant, order of a few seconds)."

use dashmap::DashMap;
use mtce_common::NodeHandle;
use std::time::{Duration, Instant};

/// A few seconds, per spec §4.2's "order of a few seconds".
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracks outstanding command ACKs across all nodes. One instance shared
/// by the dispatcher; stage handlers register a wait when they send a
/// command with side effects and poll `poll` on later ticks.
pub struct AckWaiter {
    pending: DashMap<(NodeHandle, u32), Instant>,
}

/// Outcome of polling an outstanding ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    StillWaiting,
    Acked,
    TimedOut,
}

impl AckWaiter {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Register that `handle` is now awaiting a `cmdRsp` for `cmd`.
    pub fn await_ack(&self, handle: NodeHandle, cmd: u32) {
        self.pending.insert((handle, cmd), Instant::now());
    }

    /// Record an observed `CommandResponse { cmd, .. }` from `handle`.
    /// Returns true if this satisfied an outstanding wait.
    pub fn observe(&self, handle: NodeHandle, cmd: u32) -> bool {
        self.pending.remove(&(handle, cmd)).is_some()
    }

    /// Poll whether the ACK for `(handle, cmd)` is still outstanding, has
    /// been satisfied (no longer tracked — `observe` already consumed it,
    /// so callers should treat an absent entry they didn't just `observe`
    /// as `Acked`), or has timed out.
    pub fn poll(&self, handle: NodeHandle, cmd: u32) -> AckOutcome {
        match self.pending.get(&(handle, cmd)) {
            Some(started) => {
                if started.elapsed() >= ACK_TIMEOUT {
                    drop(started);
                    self.pending.remove(&(handle, cmd));
                    AckOutcome::TimedOut
                } else {
                    AckOutcome::StillWaiting
                }
            }
            None => AckOutcome::Acked,
        }
    }
}

impl Default for AckWaiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_satisfies_a_pending_wait() {
        let waiter = AckWaiter::new();
        waiter.await_ack(NodeHandle(1), 7);
        assert!(waiter.observe(NodeHandle(1), 7));
        assert_eq!(waiter.poll(NodeHandle(1), 7), AckOutcome::Acked);
    }

    #[test]
    fn unmatched_observe_is_a_no_op() {
        let waiter = AckWaiter::new();
        assert!(!waiter.observe(NodeHandle(1), 7));
    }
}
