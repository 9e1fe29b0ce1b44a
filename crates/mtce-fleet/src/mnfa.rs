//! Multi-node failure avoidance (spec §4.9 `C9`): "tracks the count of
//! currently in-trouble hosts per heartbeat interface. When it exceeds a
//! configured threshold (either absolute count or percent of enabled
//! hosts), the system enters multi-node-failure-avoidance: individual
//! heartbeat failures are suppressed (no reset/degrade on a single host)
//! for a configurable recovery window. MNFA exits when the trouble count
//! returns to zero or a per-host mnfa timeout elapses; on exit the
//! hbsAgent heartbeat cadence is restored and lingering `hbs_minor` flags
//! are cleared."
//!
//! Tracked as a per-interface `HashSet` of hostnames in trouble rather
//! than one fleet-wide counter, because spec §3/§4.9 ties heartbeat
//! trouble to a specific network interface.

use mtce_common::NodeHandle;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// How the trip threshold is expressed (spec §6 config: "MNFA threshold
/// type/percent/number").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    Absolute(u32),
    /// Percent of currently-enabled hosts, 1-100.
    Percent(u8),
}

impl Default for ThresholdKind {
    fn default() -> Self {
        ThresholdKind::Absolute(2)
    }
}

impl ThresholdKind {
    fn trips(&self, trouble_count: usize, enabled_count: usize) -> bool {
        match *self {
            ThresholdKind::Absolute(n) => trouble_count >= n as usize,
            ThresholdKind::Percent(pct) => {
                if enabled_count == 0 {
                    false
                } else {
                    trouble_count * 100 >= enabled_count * pct as usize
                }
            }
        }
    }
}

/// A heartbeat interface, mirroring `mtce-registry`'s per-network fields
/// (spec §3 "Per-network heartbeat").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    Management,
    ClusterHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetState {
    Normal,
    Active,
}

/// Side effects the caller owes the world on an MNFA state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Entered MNFA: the caller must suppress individual reset/degrade
    /// actions on hosts in trouble and back off the hbsAgent's heartbeat
    /// cadence.
    Entered,
    /// Exited MNFA: restore the hbsAgent cadence and clear lingering
    /// `hbs_minor` flags on hosts that were in trouble.
    Exited,
}

/// The MNFA controller. One instance shared by the fleet dispatcher loop.
pub struct MnfaController {
    threshold: ThresholdKind,
    recovery_window: Duration,
    state: FleetState,
    trouble: HashMap<Interface, HashSet<NodeHandle>>,
    /// Per-host deadline past which MNFA exits regardless of trouble count
    /// (spec: "or a per-host mnfa timeout elapses").
    per_host_timeout: HashMap<NodeHandle, Instant>,
    mnfa_timeout: Duration,
    /// Last time each host was reported in trouble, kept past the moment
    /// it clears so the recovery window still protects it briefly after
    /// recovery.
    last_trouble_at: HashMap<NodeHandle, Instant>,
}

impl MnfaController {
    pub fn new(threshold: ThresholdKind, recovery_window: Duration, mnfa_timeout: Duration) -> Self {
        Self {
            threshold,
            recovery_window,
            state: FleetState::Normal,
            trouble: HashMap::new(),
            per_host_timeout: HashMap::new(),
            mnfa_timeout,
            last_trouble_at: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, FleetState::Active)
    }

    /// True if `handle`'s individual heartbeat failure/degrade action
    /// should be suppressed this tick (spec §4.9: "individual heartbeat
    /// failures are suppressed ... for a configurable recovery window").
    /// Scoped to hosts that have actually been in trouble: a host still
    /// marked in trouble stays suppressed, and one that just cleared stays
    /// suppressed for the configured recovery window after. A host that
    /// was never reported in trouble is never suppressed, even while MNFA
    /// is active fleet-wide.
    pub fn suppresses(&self, handle: NodeHandle) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.trouble.values().any(|set| set.contains(&handle)) {
            return true;
        }
        self.last_trouble_at
            .get(&handle)
            .is_some_and(|at| at.elapsed() < self.recovery_window)
    }

    /// Record a new heartbeat-trouble event for `handle` on `interface`
    /// and recompute fleet state against `enabled_count` currently-enabled
    /// hosts. Returns the transition the caller must react to.
    pub fn report_trouble(&mut self, handle: NodeHandle, interface: Interface, enabled_count: usize, now: Instant) -> Transition {
        self.trouble.entry(interface).or_default().insert(handle);
        self.per_host_timeout.insert(handle, now + self.mnfa_timeout);
        self.last_trouble_at.insert(handle, now);
        self.recompute(enabled_count, now)
    }

    /// Clear `handle`'s trouble marker on `interface` (it recovered).
    pub fn clear_trouble(&mut self, handle: NodeHandle, interface: Interface, enabled_count: usize, now: Instant) -> Transition {
        if let Some(set) = self.trouble.get_mut(&interface) {
            set.remove(&handle);
        }
        self.per_host_timeout.remove(&handle);
        self.recompute(enabled_count, now)
    }

    /// Periodic tick: expire any per-host mnfa timeout even if the trouble
    /// count hasn't dropped to zero.
    pub fn tick(&mut self, enabled_count: usize, now: Instant) -> Transition {
        let expired: Vec<NodeHandle> = self
            .per_host_timeout
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(h, _)| *h)
            .collect();
        for handle in expired {
            for set in self.trouble.values_mut() {
                set.remove(&handle);
            }
            self.per_host_timeout.remove(&handle);
        }
        self.recompute(enabled_count, now)
    }

    fn distinct_trouble_hosts(&self) -> usize {
        self.trouble.values().flat_map(|s| s.iter()).collect::<HashSet<_>>().len()
    }

    fn recompute(&mut self, enabled_count: usize, _now: Instant) -> Transition {
        let trouble_count = self.distinct_trouble_hosts();
        match self.state {
            FleetState::Normal if self.threshold.trips(trouble_count, enabled_count) => {
                self.state = FleetState::Active;
                Transition::Entered
            }
            FleetState::Active if trouble_count == 0 => {
                self.state = FleetState::Normal;
                Transition::Exited
            }
            _ => Transition::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> NodeHandle {
        NodeHandle(n)
    }

    #[test]
    fn absolute_threshold_trips_at_exact_count() {
        let mut mnfa = MnfaController::new(ThresholdKind::Absolute(5), Duration::from_secs(120), Duration::from_secs(600));
        let now = Instant::now();
        for i in 0..4 {
            assert_eq!(
                mnfa.report_trouble(h(i), Interface::Management, 20, now),
                Transition::None
            );
        }
        assert_eq!(
            mnfa.report_trouble(h(5), Interface::Management, 20, now),
            Transition::Entered
        );
        assert!(mnfa.is_active());
    }

    #[test]
    fn trouble_count_returning_to_zero_exits() {
        let mut mnfa = MnfaController::new(ThresholdKind::Absolute(1), Duration::from_secs(1), Duration::from_secs(600));
        let now = Instant::now();
        mnfa.report_trouble(h(1), Interface::Management, 10, now);
        assert!(mnfa.is_active());
        let t = mnfa.clear_trouble(h(1), Interface::Management, 10, now);
        assert_eq!(t, Transition::Exited);
        assert!(!mnfa.is_active());
    }

    #[test]
    fn per_host_timeout_forces_exit_even_with_lingering_trouble_elsewhere() {
        let mut mnfa = MnfaController::new(ThresholdKind::Absolute(1), Duration::from_secs(1), Duration::from_millis(10));
        let now = Instant::now();
        mnfa.report_trouble(h(1), Interface::Management, 10, now);
        assert!(mnfa.is_active());
        let later = now + Duration::from_millis(50);
        let t = mnfa.tick(10, later);
        assert_eq!(t, Transition::Exited);
    }

    #[test]
    fn percent_threshold_scales_with_enabled_count() {
        let mut mnfa = MnfaController::new(ThresholdKind::Percent(25), Duration::from_secs(1), Duration::from_secs(600));
        let now = Instant::now();
        // 25% of 20 enabled hosts = 5.
        for i in 0..4 {
            assert_eq!(mnfa.report_trouble(h(i), Interface::Management, 20, now), Transition::None);
        }
        assert_eq!(mnfa.report_trouble(h(99), Interface::Management, 20, now), Transition::Entered);
    }

    #[test]
    fn suppression_holds_for_hosts_marked_in_trouble() {
        let mut mnfa = MnfaController::new(ThresholdKind::Absolute(1), Duration::from_secs(60), Duration::from_secs(600));
        let now = Instant::now();
        mnfa.report_trouble(h(7), Interface::Management, 10, now);
        assert!(mnfa.suppresses(h(7)));
        assert!(!mnfa.suppresses(h(8)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Spec §4.9/§6: an absolute MNFA threshold trips for any trouble
        /// count at or above the configured number, regardless of how many
        /// hosts happen to be enabled.
        #[test]
        fn absolute_threshold_trips_iff_count_at_least_n(n in 1u32..50, count in 0usize..100, enabled in 0usize..100) {
            let kind = ThresholdKind::Absolute(n);
            prop_assert_eq!(kind.trips(count, enabled), count >= n as usize);
        }

        /// A percent threshold trips iff the trouble count is at least
        /// `pct` percent of the enabled count, for any combination.
        #[test]
        fn percent_threshold_matches_arithmetic(pct in 1u8..=100, count in 0usize..200, enabled in 1usize..200) {
            let kind = ThresholdKind::Percent(pct);
            prop_assert_eq!(kind.trips(count, enabled), count * 100 >= enabled * pct as usize);
        }

        /// A zero enabled count never trips a percent threshold, no matter
        /// how large the trouble count is (division-by-zero guard).
        #[test]
        fn percent_threshold_never_trips_with_zero_enabled(pct in 1u8..=100, count in 0usize..50) {
            let kind = ThresholdKind::Percent(pct);
            prop_assert!(!kind.trips(count, 0));
        }
    }
}
