//! Heartbeat event consumer (spec §4.9): "receives loss/minor-set/
//! minor-clr/degrade-set/degrade-clr/ready events from the heartbeat
//! service and maps them to `manage_heartbeat_failure`,
//! `manage_heartbeat_degrade`, `manage_heartbeat_minor` with interface
//! context. Actions are gated by a configured `hbs_failure_action` of
//! {fail, degrade, alarm-only, none}."
//!
//! The heartbeat pulse protocol itself is out of scope (spec §1
//! Non-goals); this module only consumes the already-decided loss/minor/
//! degrade events the sibling heartbeat service publishes and decides
//! what the core does about them.

use crate::mnfa::Interface;
use serde::{Deserialize, Serialize};

/// Raw events received from the heartbeat service (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    Loss,
    MinorSet,
    MinorClear,
    DegradeSet,
    DegradeClear,
    /// hbsAgent has finished (re)establishing monitoring for this host.
    Ready,
}

/// Configured reaction to a heartbeat-loss event (spec §6 config
/// `hbs_failure_action`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HbsFailureAction {
    Fail,
    Degrade,
    AlarmOnly,
    None,
}

impl Default for HbsFailureAction {
    fn default() -> Self {
        HbsFailureAction::Fail
    }
}

/// What the caller must do in response to a consumed heartbeat event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    None,
    /// `manage_heartbeat_minor`: set/clear the minor counter and,
    /// depending on `hbs_minor_count`, the minor degrade-mask bit.
    SetMinor,
    ClearMinor,
    /// `manage_heartbeat_degrade`: set/clear the degrade-mask bit for this
    /// interface.
    SetDegrade,
    ClearDegrade,
    /// `manage_heartbeat_failure`: drive the host through reset/enable
    /// per `hbs_failure_action`.
    RaiseFailure,
    RaiseFailureDegradeOnly,
    RaiseFailureAlarmOnly,
    /// Suppressed by MNFA (spec §4.9): the event is still counted, but the
    /// per-host action is withheld.
    SuppressedByMnfa,
    ServiceReady,
}

/// `manage_heartbeat_minor` (spec §4.9), pure decision function: the
/// caller owns the actual `hbs_minor_count` counter and threshold
/// comparison in `mtce-registry`; this just names what happens on the two
/// event kinds this module understands.
pub fn manage_heartbeat_minor(event: HeartbeatEvent) -> Reaction {
    match event {
        HeartbeatEvent::MinorSet => Reaction::SetMinor,
        HeartbeatEvent::MinorClear => Reaction::ClearMinor,
        _ => Reaction::None,
    }
}

pub fn manage_heartbeat_degrade(event: HeartbeatEvent, mnfa_active_for_host: bool) -> Reaction {
    match event {
        HeartbeatEvent::DegradeSet if mnfa_active_for_host => Reaction::SuppressedByMnfa,
        HeartbeatEvent::DegradeSet => Reaction::SetDegrade,
        HeartbeatEvent::DegradeClear => Reaction::ClearDegrade,
        _ => Reaction::None,
    }
}

/// `manage_heartbeat_failure` (spec §4.9): dispatches on the configured
/// `hbs_failure_action` and whether MNFA currently suppresses this host's
/// individual reaction.
pub fn manage_heartbeat_failure(
    event: HeartbeatEvent,
    action: HbsFailureAction,
    mnfa_active_for_host: bool,
) -> Reaction {
    if event != HeartbeatEvent::Loss {
        return Reaction::None;
    }
    if mnfa_active_for_host {
        return Reaction::SuppressedByMnfa;
    }
    match action {
        HbsFailureAction::Fail => Reaction::RaiseFailure,
        HbsFailureAction::Degrade => Reaction::RaiseFailureDegradeOnly,
        HbsFailureAction::AlarmOnly => Reaction::RaiseFailureAlarmOnly,
        HbsFailureAction::None => Reaction::None,
    }
}

/// Interface context carried alongside every consumed event, as spec §4.9
/// requires ("maps them ... with interface context").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatEventWithContext {
    pub interface: Interface,
    pub event: HeartbeatEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_with_fail_action_raises_full_failure() {
        assert_eq!(
            manage_heartbeat_failure(HeartbeatEvent::Loss, HbsFailureAction::Fail, false),
            Reaction::RaiseFailure
        );
    }

    #[test]
    fn loss_suppressed_by_mnfa_withholds_the_reaction() {
        assert_eq!(
            manage_heartbeat_failure(HeartbeatEvent::Loss, HbsFailureAction::Fail, true),
            Reaction::SuppressedByMnfa
        );
    }

    #[test]
    fn alarm_only_action_never_resets_the_host() {
        assert_eq!(
            manage_heartbeat_failure(HeartbeatEvent::Loss, HbsFailureAction::AlarmOnly, false),
            Reaction::RaiseFailureAlarmOnly
        );
    }

    #[test]
    fn non_loss_events_are_ignored_by_failure_handler() {
        assert_eq!(
            manage_heartbeat_failure(HeartbeatEvent::MinorSet, HbsFailureAction::Fail, false),
            Reaction::None
        );
    }

    #[test]
    fn minor_set_and_clear_map_through() {
        assert_eq!(manage_heartbeat_minor(HeartbeatEvent::MinorSet), Reaction::SetMinor);
        assert_eq!(manage_heartbeat_minor(HeartbeatEvent::MinorClear), Reaction::ClearMinor);
    }

    #[test]
    fn degrade_set_suppressed_by_mnfa() {
        assert_eq!(
            manage_heartbeat_degrade(HeartbeatEvent::DegradeSet, true),
            Reaction::SuppressedByMnfa
        );
        assert_eq!(
            manage_heartbeat_degrade(HeartbeatEvent::DegradeSet, false),
            Reaction::SetDegrade
        );
    }
}
