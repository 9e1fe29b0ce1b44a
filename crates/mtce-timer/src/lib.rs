//! Timer service (spec §4.1 / component C1).
//!
//! Exposes `start`/`start_msec`/`reset`/`expired` over a fixed, named set
//! of per-node timer slots (mtcAlive, offline, the generic per-stage
//! timer, http, mtcCmd, oosTest, insvTest, swact, config, power,
//! host_services, bm, bmc_access — spec §3 "Timers"). A single process-wide
//! `tick()` stands in for the original's signal-driven alarm: the event
//! loop calls it once per pass before polling `expired()`.
//!
//! No timer here owns a callback. Spec §4.1 is explicit that "no timer
//! callback may block; a callback that needs work enqueues into C4/C5/C6",
//! so the dispatcher (in `mtce-fsm`) polls `expired(handle, kind)` itself
//! and decides what to enqueue — this crate only tracks deadlines and the
//! one-shot ring flag: a shared map of deadlines, read on every tick, with
//! no stored closures.

use dashmap::DashMap;
use mtce_common::{NodeHandle, TimerId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// The fixed set of per-node timer slots named in spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    MtcAlive,
    Offline,
    /// Generic per-stage timer used by most C7 handlers.
    Stage,
    Http,
    MtcCmd,
    OosTest,
    InsvTest,
    Swact,
    Config,
    Power,
    HostServices,
    Bm,
    BmcAccess,
}

struct TimerEntry {
    id: TimerId,
    deadline: Instant,
    /// Set by `tick()` when `deadline` has passed; consumed by `expired()`.
    ring: AtomicBool,
}

/// The process-wide timer table. One instance is shared by the event loop
/// and every stage handler.
pub struct TimerService {
    timers: DashMap<(NodeHandle, TimerKind), TimerEntry>,
    by_id: DashMap<TimerId, (NodeHandle, TimerKind)>,
    next_id: AtomicU64,
}

impl TimerService {
    pub fn new() -> Self {
        Self {
            timers: DashMap::new(),
            by_id: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Arm `kind` for `handle` to fire `seconds` from now. Always succeeds,
    /// including immediately after a `reset` (spec §8 timer law).
    pub fn start(&self, handle: NodeHandle, kind: TimerKind, seconds: u64) -> TimerId {
        self.start_msec(handle, kind, seconds.saturating_mul(1000))
    }

    /// Millisecond-resolution variant of `start`.
    pub fn start_msec(&self, handle: NodeHandle, kind: TimerKind, ms: u64) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let deadline = Instant::now() + Duration::from_millis(ms);
        self.timers.insert(
            (handle, kind),
            TimerEntry {
                id,
                deadline,
                ring: AtomicBool::new(false),
            },
        );
        self.by_id.insert(id, (handle, kind));
        id
    }

    /// Disarm a timer without it ever reporting expired. Always succeeds,
    /// including on a slot that was never armed.
    pub fn reset(&self, handle: NodeHandle, kind: TimerKind) {
        if let Some((_, entry)) = self.timers.remove(&(handle, kind)) {
            self.by_id.remove(&entry.id);
        }
    }

    /// True exactly once per fire: the first `expired()` call after the
    /// deadline passes returns `true` and clears the slot; every call
    /// thereafter (until the next `start`) returns `false`.
    pub fn expired(&self, handle: NodeHandle, kind: TimerKind) -> bool {
        let fired = match self.timers.get(&(handle, kind)) {
            Some(entry) => entry.ring.swap(false, Ordering::AcqRel),
            None => false,
        };
        if fired {
            self.reset(handle, kind);
        }
        fired
    }

    /// Look up which node and slot a raw timer id belongs to. Used by the
    /// signal/event-loop entry point, which only has the id.
    pub fn owner_of(&self, id: TimerId) -> Option<(NodeHandle, TimerKind)> {
        self.by_id.get(&id).map(|kv| *kv)
    }

    /// Process-wide tick: mark `ring` on every timer whose deadline has
    /// passed. Cheap and non-blocking, called once per dispatcher pass.
    pub fn tick(&self) {
        let now = Instant::now();
        for entry in self.timers.iter() {
            if now >= entry.deadline && !entry.ring.load(Ordering::Acquire) {
                trace!(timer_id = entry.id.0, "timer expired");
                entry.ring.store(true, Ordering::Release);
            }
        }
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> NodeHandle {
        NodeHandle(n)
    }

    #[test]
    fn expired_fires_exactly_once() {
        let svc = TimerService::new();
        svc.start_msec(h(1), TimerKind::Stage, 0);
        svc.tick();
        assert!(svc.expired(h(1), TimerKind::Stage));
        assert!(!svc.expired(h(1), TimerKind::Stage));
    }

    #[test]
    fn reset_then_start_always_succeeds() {
        let svc = TimerService::new();
        svc.start(h(1), TimerKind::Stage, 60);
        svc.reset(h(1), TimerKind::Stage);
        let id = svc.start(h(1), TimerKind::Stage, 60);
        assert_eq!(svc.owner_of(id), Some((h(1), TimerKind::Stage)));
    }

    #[test]
    fn unarmed_timer_is_never_expired() {
        let svc = TimerService::new();
        svc.tick();
        assert!(!svc.expired(h(7), TimerKind::MtcAlive));
    }

    #[test]
    fn owner_of_resolves_reverse_lookup() {
        let svc = TimerService::new();
        let id = svc.start(h(42), TimerKind::BmcAccess, 5);
        assert_eq!(svc.owner_of(id), Some((h(42), TimerKind::BmcAccess)));
    }
}
