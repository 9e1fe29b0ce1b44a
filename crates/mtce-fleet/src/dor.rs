//! Dead-office recovery (spec §4.9 `C9`): "activates when the active
//! controller itself comes up recently: each slave host's availability
//! transitions are evaluated against an extended window and a per-host
//! DOR-recovery log records how long each host took."
//!
//! DOR only changes the *timeout* a host's enable sequence is allowed
//! (an extended window, covering the worst case of an entire office power
//! cycle) and records how long each host actually took to come back — it
//! does not itself drive any stage transition, matching spec §4.9's
//! description as an evaluation/logging overlay rather than a handler.

use mtce_common::NodeHandle;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One host's recorded recovery outcome, kept for the DOR-recovery log
/// (spec: "a per-host DOR-recovery log records how long each host took").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryRecord {
    pub took: Duration,
    pub within_window: bool,
}

/// Tracks whether the fleet is currently in a dead-office-recovery window
/// (the active controller came up recently) and the per-host extended
/// deadlines/log entries that implies.
pub struct DorController {
    activated_at: Option<Instant>,
    /// How long after the active controller's own boot DOR stays active
    /// fleet-wide (spec: "an extended window").
    extended_window: Duration,
    pending: HashMap<NodeHandle, Instant>,
    log: HashMap<NodeHandle, RecoveryRecord>,
}

impl DorController {
    pub fn new(extended_window: Duration) -> Self {
        Self {
            activated_at: None,
            extended_window,
            pending: HashMap::new(),
            log: HashMap::new(),
        }
    }

    /// Called once at daemon startup with the active controller's own
    /// uptime; activates DOR only when that uptime is within the extended
    /// window (i.e. the controller, too, just came up — spec: "activates
    /// when the active controller itself comes up recently").
    pub fn activate_if_recent_boot(&mut self, controller_uptime: Duration, now: Instant) {
        if controller_uptime < self.extended_window {
            self.activated_at = Some(now - controller_uptime);
        }
    }

    pub fn is_active(&self, now: Instant) -> bool {
        match self.activated_at {
            Some(at) => now.duration_since(at) < self.extended_window,
            None => false,
        }
    }

    /// Register that `handle` has begun its post-outage enable sequence;
    /// it is granted the extended window instead of the handler's normal
    /// per-stage timeout while DOR is active.
    pub fn track(&mut self, handle: NodeHandle, now: Instant) {
        if self.is_active(now) {
            self.pending.insert(handle, now);
        }
    }

    /// Extended deadline for `handle`, if DOR is tracking it, else `None`
    /// (the caller falls back to the handler's ordinary timeout).
    pub fn extended_deadline(&self, handle: NodeHandle) -> Option<Instant> {
        self.pending.get(&handle).map(|started| *started + self.extended_window)
    }

    /// Record that `handle` reached `unlocked-enabled-available`, logging
    /// how long it took since DOR started tracking it.
    pub fn record_recovered(&mut self, handle: NodeHandle, now: Instant) -> Option<RecoveryRecord> {
        let started = self.pending.remove(&handle)?;
        let took = now.duration_since(started);
        let record = RecoveryRecord {
            took,
            within_window: took < self.extended_window,
        };
        self.log.insert(handle, record);
        Some(record)
    }

    pub fn log_for(&self, handle: NodeHandle) -> Option<RecoveryRecord> {
        self.log.get(&handle).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> NodeHandle {
        NodeHandle(n)
    }

    #[test]
    fn recent_controller_boot_activates_dor() {
        let mut dor = DorController::new(Duration::from_secs(600));
        let now = Instant::now();
        dor.activate_if_recent_boot(Duration::from_secs(30), now);
        assert!(dor.is_active(now));
    }

    #[test]
    fn stale_controller_boot_never_activates_dor() {
        let mut dor = DorController::new(Duration::from_secs(600));
        let now = Instant::now();
        dor.activate_if_recent_boot(Duration::from_secs(3600), now);
        assert!(!dor.is_active(now));
    }

    #[test]
    fn tracked_host_gets_an_extended_deadline() {
        let mut dor = DorController::new(Duration::from_secs(600));
        let now = Instant::now();
        dor.activate_if_recent_boot(Duration::from_secs(10), now);
        dor.track(h(1), now);
        assert!(dor.extended_deadline(h(1)).is_some());
    }

    #[test]
    fn recovery_is_logged_with_elapsed_time() {
        let mut dor = DorController::new(Duration::from_secs(600));
        let now = Instant::now();
        dor.activate_if_recent_boot(Duration::from_secs(10), now);
        dor.track(h(1), now);
        let later = now + Duration::from_secs(45);
        let record = dor.record_recovered(h(1), later).unwrap();
        assert_eq!(record.took, Duration::from_secs(45));
        assert!(record.within_window);
        assert_eq!(dor.log_for(h(1)).unwrap(), record);
    }
}
