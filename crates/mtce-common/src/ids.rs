//! Opaque handles used instead of the original's raw node pointers.
//!
//! Design note (spec §9): "Intrusive doubly-linked list of nodes + raw
//! pointer indices. Replace with a slotmap / arena keyed by stable integer
//! handle; secondary indices are maps from string/uuid/timer-id to handle.
//! Timer callbacks carry the handle, not a pointer, so a freed node's
//! expired timer is a safe no-op."

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable arena handle for a node record. Never reused for the lifetime of
/// the process: the registry's generation counter only increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Monotonically increasing handle allocator, shared by the registry.
#[derive(Debug, Default)]
pub struct HandleAllocator(AtomicU64);

impl HandleAllocator {
    /// New allocator starting at handle 1 (0 is reserved as "no handle").
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Allocate the next handle.
    pub fn next(&self) -> NodeHandle {
        NodeHandle(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Opaque per-timer id. A timer callback carries this, not a pointer, so a
/// node freed while a timer is still outstanding causes a safe no-op lookup
/// (the registry's by-timer-id index is cleared on delete, see §3 lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Opaque event-base id used to route inbound socket events back to a node
/// (spec §3: "secondary lookups ... by event base").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventBase(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_never_repeats() {
        let alloc = HandleAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        assert_ne!(a, b);
        assert!(b.0 > a.0);
    }
}
