//! `disable_handler` (spec §4.7): "start -> force-lock (optional) ->
//! reset-host-wait -> disable-services -> dis-services-wait ->
//! ceph-lock-wait (storage) -> task-state-update -> workqueue-wait ->
//! disabled."

use mtce_common::TaskString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Start,
    ResetHostWait,
    DisableServices,
    DisServicesWait,
    /// Only entered for `Personality::Storage` (spec §4.7).
    CephLockWait,
    TaskStateUpdate,
    WorkQueueWait,
    Disabled,
    Failure,
}

impl Stage {
    pub fn as_task_str(&self) -> TaskString {
        match self {
            Stage::Start | Stage::ResetHostWait => TaskString::Disabling,
            Stage::DisableServices | Stage::DisServicesWait => TaskString::DisablingHostServices,
            Stage::CephLockWait | Stage::TaskStateUpdate | Stage::WorkQueueWait => {
                TaskString::Disabling
            }
            Stage::Disabled => TaskString::None,
            Stage::Failure => TaskString::Failed("disable".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    /// `true` when the admin requested `ForceLock` (spec §3 `AdminAction`):
    /// skips the graceful reset-host wait.
    Forced(bool),
    HostResetOrOffline,
    ServicesDone { ok: bool },
    CephLockAcquired,
    TaskStateUpdated,
    WorkQueueDrained,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    SendResetHost,
    SendDisableServices,
    RequestCephLock,
    UpdateTaskState,
    EnqueueWorkQueueWait,
    MarkDisabled,
    EnterFailure,
}

/// `is_storage` selects whether `DisableServices` routes through
/// `CephLockWait` before `TaskStateUpdate` (spec §4.7 "ceph-lock-wait
/// (storage)").
pub fn step(stage: Stage, event: Event, is_storage: bool) -> (Action, Option<Stage>) {
    use Event::*;
    use Stage::*;

    match (stage, event) {
        (Start, Forced(true)) => (Action::None, Some(DisableServices)),
        (Start, Forced(false)) => (Action::SendResetHost, Some(ResetHostWait)),
        (ResetHostWait, HostResetOrOffline) => {
            (Action::SendDisableServices, Some(DisableServices))
        }
        (DisableServices, Tick) => (Action::None, Some(DisServicesWait)),
        (DisServicesWait, ServicesDone { ok: true }) if is_storage => {
            (Action::RequestCephLock, Some(CephLockWait))
        }
        (DisServicesWait, ServicesDone { ok: true }) => {
            (Action::UpdateTaskState, Some(TaskStateUpdate))
        }
        (DisServicesWait, ServicesDone { ok: false }) => {
            (Action::EnterFailure, Some(Failure))
        }
        (CephLockWait, CephLockAcquired) => {
            (Action::UpdateTaskState, Some(TaskStateUpdate))
        }
        (TaskStateUpdate, TaskStateUpdated) => {
            (Action::EnqueueWorkQueueWait, Some(WorkQueueWait))
        }
        (WorkQueueWait, WorkQueueDrained) => (Action::MarkDisabled, Some(Disabled)),
        (s, TimedOut) if !matches!(s, Disabled | Failure) => {
            (Action::EnterFailure, Some(Failure))
        }
        _ => (Action::None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_lock_skips_reset_host_wait() {
        let (action, next) = step(Stage::Start, Event::Forced(true), false);
        assert_eq!(action, Action::None);
        assert_eq!(next, Some(Stage::DisableServices));
    }

    #[test]
    fn graceful_lock_waits_for_reset_host_first() {
        let (action, next) = step(Stage::Start, Event::Forced(false), false);
        assert_eq!(action, Action::SendResetHost);
        assert_eq!(next, Some(Stage::ResetHostWait));
    }

    #[test]
    fn storage_host_takes_ceph_lock_detour() {
        let (action, next) = step(
            Stage::DisServicesWait,
            Event::ServicesDone { ok: true },
            true,
        );
        assert_eq!(action, Action::RequestCephLock);
        assert_eq!(next, Some(Stage::CephLockWait));
    }

    #[test]
    fn non_storage_host_skips_ceph_lock() {
        let (action, next) = step(
            Stage::DisServicesWait,
            Event::ServicesDone { ok: true },
            false,
        );
        assert_eq!(action, Action::UpdateTaskState);
        assert_eq!(next, Some(Stage::TaskStateUpdate));
    }

    #[test]
    fn full_graceful_sequence_reaches_disabled() {
        let mut stage = Stage::Start;
        for event in [
            Event::Forced(false),
            Event::HostResetOrOffline,
            Event::Tick,
            Event::ServicesDone { ok: true },
            Event::TaskStateUpdated,
            Event::WorkQueueDrained,
        ] {
            let (_, next) = step(stage, event, false);
            if let Some(next) = next {
                stage = next;
            }
        }
        assert_eq!(stage, Stage::Disabled);
    }
}
