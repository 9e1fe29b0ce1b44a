//! Per-node stage state owned by the dispatcher (spec §9 design note:
//! "Union of stage enums ... replace with a tagged variant per action,
//! owned by the node record; the dispatcher matches on `adminAction` and
//! unwraps the corresponding variant"). Kept outside `mtce-registry` so
//! that crate never depends on every handler module.

use crate::handlers::{action, disable, enable, recovery};
use mtce_common::{AdminAction, TaskString};
use tracing::error;

/// The stage a node is currently sitting in, tagged by which handler
/// owns it. Exactly one variant is live per node at a time, matching
/// spec §3's "exactly one adminAction executing per node".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageUnion {
    /// No admin action in progress.
    Idle,
    Enable(enable::Stage),
    Recovery(recovery::Stage),
    Disable(disable::Stage),
    Action(action::ActionKind, action::Stage),
    /// A proposed transition didn't match the node's current admin
    /// action; demoted here rather than silently accepted (spec §4.7).
    Kill,
}

impl StageUnion {
    pub fn task_str(&self) -> TaskString {
        match self {
            StageUnion::Idle => TaskString::None,
            StageUnion::Enable(s) => s.as_task_str(),
            StageUnion::Recovery(_) => TaskString::Recovering,
            StageUnion::Disable(s) => s.as_task_str(),
            StageUnion::Action(kind, s) => s.as_task_str(*kind),
            StageUnion::Kill => TaskString::Failed("invalid stage transition".to_string()),
        }
    }

    /// Which `AdminAction` a non-idle variant belongs to, used to
    /// validate a proposed transition before accepting it.
    pub fn admin_action(&self) -> Option<AdminAction> {
        match self {
            StageUnion::Idle | StageUnion::Kill => None,
            StageUnion::Enable(_) => Some(AdminAction::Enable),
            StageUnion::Recovery(_) => Some(AdminAction::Recover),
            StageUnion::Disable(_) => Some(AdminAction::Lock),
            StageUnion::Action(kind, _) => Some(match kind {
                action::ActionKind::Reset => AdminAction::Reset,
                action::ActionKind::Reboot => AdminAction::Reboot,
                action::ActionKind::Reinstall => AdminAction::Reinstall,
                action::ActionKind::PowerOff => AdminAction::PowerOff,
                action::ActionKind::PowerOn => AdminAction::PowerOn,
                action::ActionKind::Powercycle => AdminAction::Powercycle,
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageUnion::Idle
                | StageUnion::Kill
                | StageUnion::Enable(enable::Stage::Enabled)
                | StageUnion::Disable(disable::Stage::Disabled)
                | StageUnion::Recovery(recovery::Stage::Recovered)
                | StageUnion::Recovery(recovery::Stage::FallThroughToEnable)
                | StageUnion::Action(_, action::Stage::Done)
                | StageUnion::Action(_, action::Stage::Fail)
        )
    }
}

/// Per-node stage bookkeeping: the live [`StageUnion`] plus the retry and
/// log-throttle counters that outlive any single `step` call (spec §14
/// "repeated no-op ticks in a wait-stage don't spam logs").
#[derive(Debug, Clone)]
pub struct NodeStageState {
    pub union: StageUnion,
    pub retries: u32,
    log_throttle: u32,
}

impl NodeStageState {
    pub fn idle() -> Self {
        Self {
            union: StageUnion::Idle,
            retries: 0,
            log_throttle: 0,
        }
    }

    /// Start a fresh stage sequence for `action`, resetting retries.
    pub fn start(&mut self, union: StageUnion) {
        self.union = union;
        self.retries = 0;
        self.log_throttle = 0;
    }

    /// Validate and apply a proposed transition: the target's admin
    /// action must match `current_action`, or the target must itself be
    /// idle/kill. Demotes to `Kill` on mismatch rather than silently
    /// accepting a stage that belongs to a different action.
    pub fn transition(&mut self, hostname: &str, next: StageUnion, current_action: AdminAction) {
        if let Some(expected) = next.admin_action() {
            if expected != current_action {
                error!(
                    hostname,
                    ?next,
                    ?current_action,
                    "stage/admin-action mismatch, demoting to KILL"
                );
                self.union = StageUnion::Kill;
                self.log_throttle = 0;
                return;
            }
        }
        self.union = next;
        self.log_throttle = 0;
    }

    /// Whether this tick's repeat-stage log should actually be emitted.
    /// Returns `true` only the first time it's called since the last
    /// transition.
    pub fn throttled_tick(&mut self) -> bool {
        self.log_throttle = self.log_throttle.saturating_add(1);
        self.log_throttle == 1
    }
}

impl Default for NodeStageState {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_transition_demotes_to_kill() {
        let mut state = NodeStageState::idle();
        state.transition(
            "worker-1",
            StageUnion::Disable(disable::Stage::Start),
            AdminAction::Enable,
        );
        assert_eq!(state.union, StageUnion::Kill);
    }

    #[test]
    fn matching_transition_is_accepted() {
        let mut state = NodeStageState::idle();
        state.transition(
            "worker-1",
            StageUnion::Enable(enable::Stage::Start),
            AdminAction::Enable,
        );
        assert_eq!(state.union, StageUnion::Enable(enable::Stage::Start));
    }

    #[test]
    fn log_throttle_fires_once_per_stage() {
        let mut state = NodeStageState::idle();
        assert!(state.throttled_tick());
        assert!(!state.throttled_tick());
        state.start(StageUnion::Idle);
        assert!(state.throttled_tick());
    }

    #[test]
    fn enabled_and_disabled_are_terminal() {
        assert!(StageUnion::Enable(enable::Stage::Enabled).is_terminal());
        assert!(StageUnion::Disable(disable::Stage::Disabled).is_terminal());
        assert!(!StageUnion::Enable(enable::Stage::Start).is_terminal());
    }
}
