//! Auto-recovery threshold machinery (spec §4.9 `C9`): "counts consecutive
//! enable-handler failures and, once above a per-cause threshold,
//! suppresses further automatic recovery and publishes a user-visible
//! task string naming the cause (config / goenabled / services / enable /
//! heartbeat). A subsequent admin lock/unlock re-enables recovery."

use mtce_common::{NodeHandle, TaskString};
use std::collections::HashMap;

/// The named causes spec §4.9/§7 distinguish (`MTC_TASK_AR_DISABLED_*`
/// family).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cause {
    Config,
    Goenabled,
    Services,
    Enable,
    Heartbeat,
}

impl Cause {
    pub fn task_string(&self) -> TaskString {
        match self {
            Cause::Config => TaskString::AutoRecoveryDisabledConfig,
            Cause::Goenabled => TaskString::AutoRecoveryDisabledGoenabled,
            Cause::Services => TaskString::AutoRecoveryDisabledServices,
            Cause::Enable => TaskString::AutoRecoveryDisabledEnable,
            Cause::Heartbeat => TaskString::AutoRecoveryDisabledHeartbeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Below threshold: the enable handler should retry from `Start`.
    ContinueRetrying,
    /// Threshold just exceeded this call: publish the cause's task string
    /// and stop auto-retrying until an admin lock/unlock.
    ThresholdExceeded,
    /// Already past threshold (and not yet reset): the caller shouldn't
    /// re-publish the task string every tick.
    AlreadyDisabled,
}

#[derive(Default)]
struct Counters {
    by_cause: HashMap<Cause, u32>,
    disabled: Option<Cause>,
}

/// Per-node consecutive-failure counters, one set per cause, with a
/// configurable threshold shared across causes (spec doesn't distinguish
/// per-cause thresholds, only per-cause task strings).
pub struct AutoRecoveryTracker {
    threshold: u32,
    nodes: HashMap<NodeHandle, Counters>,
}

impl AutoRecoveryTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            nodes: HashMap::new(),
        }
    }

    /// Record one more consecutive failure of `cause` for `handle`.
    pub fn record_failure(&mut self, handle: NodeHandle, cause: Cause) -> Outcome {
        let counters = self.nodes.entry(handle).or_default();
        if let Some(disabled_cause) = counters.disabled {
            if disabled_cause == cause {
                return Outcome::AlreadyDisabled;
            }
        }
        let count = counters.by_cause.entry(cause).or_insert(0);
        *count += 1;
        if *count >= self.threshold {
            counters.disabled = Some(cause);
            Outcome::ThresholdExceeded
        } else {
            Outcome::ContinueRetrying
        }
    }

    /// A success resets the consecutive-failure count for `cause` (a
    /// single success is enough evidence that cause is no longer at fault;
    /// it does not clear `disabled` — only an explicit admin action does).
    pub fn record_success(&mut self, handle: NodeHandle, cause: Cause) {
        if let Some(counters) = self.nodes.get_mut(&handle) {
            counters.by_cause.insert(cause, 0);
        }
    }

    /// Admin lock/unlock re-enables recovery for `handle` (spec: "A
    /// subsequent admin lock/unlock re-enables recovery").
    pub fn reset_on_admin_action(&mut self, handle: NodeHandle) {
        self.nodes.remove(&handle);
    }

    pub fn is_disabled(&self, handle: NodeHandle) -> Option<Cause> {
        self.nodes.get(&handle).and_then(|c| c.disabled)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// For any threshold and any run of consecutive failures of one
        /// cause, the tracker reports `ContinueRetrying` strictly below
        /// threshold, `ThresholdExceeded` exactly once (at the threshold-th
        /// failure), and `AlreadyDisabled` for every failure after that.
        #[test]
        fn threshold_exceeded_exactly_once_at_the_configured_count(threshold in 1u32..20, extra_calls in 0u32..10) {
            let mut tracker = AutoRecoveryTracker::new(threshold);
            let handle = NodeHandle(1);
            let mut exceeded_count = 0;
            for i in 0..(threshold + extra_calls) {
                let outcome = tracker.record_failure(handle, Cause::Enable);
                if i + 1 < threshold {
                    prop_assert_eq!(outcome, Outcome::ContinueRetrying);
                } else if i + 1 == threshold {
                    prop_assert_eq!(outcome, Outcome::ThresholdExceeded);
                    exceeded_count += 1;
                } else {
                    prop_assert_eq!(outcome, Outcome::AlreadyDisabled);
                }
            }
            prop_assert_eq!(exceeded_count, 1);
            prop_assert_eq!(tracker.is_disabled(handle), Some(Cause::Enable));
        }

        /// Whatever cause disabled a node, an admin lock/unlock always
        /// clears the disabled state entirely (spec §4.9).
        #[test]
        fn admin_reset_always_clears_disabled_state(threshold in 1u32..10) {
            let mut tracker = AutoRecoveryTracker::new(threshold);
            let handle = NodeHandle(2);
            for _ in 0..threshold {
                tracker.record_failure(handle, Cause::Config);
            }
            prop_assert!(tracker.is_disabled(handle).is_some());
            tracker.reset_on_admin_action(handle);
            prop_assert!(tracker.is_disabled(handle).is_none());
        }
    }
}
