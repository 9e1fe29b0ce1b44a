//! `enable_handler` (spec §4.7): the longest stage sequence in the core.
//! "start -> heartbeat-check/stop -> recovery-timer -> reset-progression ->
//! mtcalive-purge/wait -> config-complete-wait -> go-enabled-request/wait ->
//! pmond-ready-wait -> host-services-start/wait -> services-start-wait ->
//! heartbeat-wait/soak -> state-change -> workqueue-wait -> enabled. Any
//! failure stage transitions to failure -> failure-wait (optionally
//! failure-swact-wait) -> back to start with a bounded retry count gated by
//! the auto-recovery threshold."
//!
//! Kept a pure stage-advance function like `mtce-command`'s sub-FSMs (spec
//! §13): `step` takes the current stage and an event and returns the next
//! stage plus the action the dispatcher owes the world. No timer or
//! registry access happens in here.

use mtce_common::TaskString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Start,
    HeartbeatCheck,
    HeartbeatStop,
    RecoveryTimer,
    ResetProgression,
    MtcAlivePurgeWait,
    ConfigCompleteWait,
    GoEnabledRequest,
    GoEnabledWait,
    PmondReadyWait,
    HostServicesStart,
    ServicesStartWait,
    HeartbeatWait,
    HeartbeatSoak,
    StateChange,
    WorkQueueWait,
    Enabled,
    Failure,
    FailureWait,
    FailureSwactWait,
}

impl Stage {
    /// Operator-facing task string for this stage (spec §14 "every stage
    /// enum gets a task-string mapping used when publishing `task`").
    pub fn as_task_str(&self) -> TaskString {
        match self {
            Stage::Start | Stage::HeartbeatCheck | Stage::HeartbeatStop => TaskString::Enabling,
            Stage::RecoveryTimer | Stage::ResetProgression => TaskString::EnablingResetProgression,
            Stage::MtcAlivePurgeWait => TaskString::EnablingHeartbeatCheck,
            Stage::ConfigCompleteWait => TaskString::Enabling,
            Stage::GoEnabledRequest | Stage::GoEnabledWait | Stage::PmondReadyWait => {
                TaskString::EnablingGoEnabledWait
            }
            Stage::HostServicesStart | Stage::ServicesStartWait => TaskString::EnablingHostServices,
            Stage::HeartbeatWait | Stage::HeartbeatSoak => TaskString::EnablingHeartbeatSoak,
            Stage::StateChange | Stage::WorkQueueWait => TaskString::Enabling,
            Stage::Enabled => TaskString::None,
            Stage::Failure | Stage::FailureWait | Stage::FailureSwactWait => {
                TaskString::Failed("enable".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    HeartbeatStopped,
    ResetProgressionDone { went_offline: bool },
    MtcAlivePurged,
    ConfigComplete,
    GoEnabledPass,
    GoEnabledFail,
    PmondReady,
    HostServicesDone { ok: bool },
    HeartbeatSoakComplete,
    StateChanged,
    WorkQueueDrained,
    TimedOut,
    /// Auto-recovery (spec §4.9) has disabled further retries for this
    /// cause; the next failure must stop at `FailureWait` instead of
    /// looping back to `Start`.
    RetriesExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Ask the heartbeat subsystem to stop monitoring this host while it is
    /// re-enabling.
    StopHeartbeatMonitoring,
    StartRecoveryTimer,
    StartResetProgression,
    RequestMtcAlivePurge,
    RequestConfigComplete,
    SendGoEnabledRequest,
    WaitPmondReady,
    StartHostServices,
    StartHeartbeatSoak,
    PublishStateChange,
    EnqueueWorkQueueWait,
    MarkEnabled,
    /// Transition to `Failure`: caller raises/logs per §7 and decides
    /// whether a swact is warranted before retrying.
    EnterFailure,
    /// Auto-recovery threshold reached: caller publishes the
    /// `AutoRecoveryDisabled*` task string and stops retrying.
    PublishAutoRecoveryDisabled,
}

/// Pure stage-advance function (spec §13). Returns the action the caller
/// must perform and, if the stage changed, the new stage.
pub fn step(stage: Stage, event: Event) -> (Action, Option<Stage>) {
    use Event::*;
    use Stage::*;

    match (stage, event) {
        (Start, Tick) => (Action::StopHeartbeatMonitoring, Some(HeartbeatCheck)),
        (HeartbeatCheck, Tick) | (HeartbeatCheck, HeartbeatStopped) => {
            (Action::StartRecoveryTimer, Some(HeartbeatStop))
        }
        (HeartbeatStop, Tick) => (Action::StartResetProgression, Some(RecoveryTimer)),
        (RecoveryTimer, Tick) => (Action::None, Some(ResetProgression)),
        (ResetProgression, ResetProgressionDone { went_offline: true }) => {
            (Action::RequestMtcAlivePurge, Some(MtcAlivePurgeWait))
        }
        (ResetProgression, ResetProgressionDone { went_offline: false }) => {
            (Action::EnterFailure, Some(Failure))
        }
        (MtcAlivePurgeWait, MtcAlivePurged) => {
            (Action::RequestConfigComplete, Some(ConfigCompleteWait))
        }
        (ConfigCompleteWait, ConfigComplete) => {
            (Action::SendGoEnabledRequest, Some(GoEnabledRequest))
        }
        (GoEnabledRequest, Tick) => (Action::None, Some(GoEnabledWait)),
        (GoEnabledWait, GoEnabledPass) => (Action::WaitPmondReady, Some(PmondReadyWait)),
        (GoEnabledWait, GoEnabledFail) => (Action::EnterFailure, Some(Failure)),
        (PmondReadyWait, PmondReady) => (Action::StartHostServices, Some(HostServicesStart)),
        (HostServicesStart, Tick) => (Action::None, Some(ServicesStartWait)),
        (ServicesStartWait, HostServicesDone { ok: true }) => {
            (Action::StartHeartbeatSoak, Some(HeartbeatWait))
        }
        (ServicesStartWait, HostServicesDone { ok: false }) => {
            (Action::EnterFailure, Some(Failure))
        }
        (HeartbeatWait, Tick) => (Action::None, Some(HeartbeatSoak)),
        (HeartbeatSoak, HeartbeatSoakComplete) => {
            (Action::PublishStateChange, Some(StateChange))
        }
        (StateChange, StateChanged) => (Action::EnqueueWorkQueueWait, Some(WorkQueueWait)),
        (WorkQueueWait, WorkQueueDrained) => (Action::MarkEnabled, Some(Enabled)),

        // Any in-flight stage can time out; transition straight to failure.
        (s, TimedOut) if !matches!(s, Enabled | Failure | FailureWait | FailureSwactWait) => {
            (Action::EnterFailure, Some(Failure))
        }

        (Failure, RetriesExhausted) => {
            (Action::PublishAutoRecoveryDisabled, Some(FailureWait))
        }
        (Failure, Tick) => (Action::None, Some(FailureWait)),
        (FailureWait, Tick) => (Action::None, Some(Start)),
        (FailureSwactWait, Tick) => (Action::None, Some(Start)),

        _ => (Action::None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_happy_path_reaches_enabled() {
        let mut stage = Stage::Start;
        let events = [
            Event::Tick,
            Event::Tick,
            Event::Tick,
            Event::Tick,
            Event::ResetProgressionDone { went_offline: true },
            Event::MtcAlivePurged,
            Event::ConfigComplete,
            Event::Tick,
            Event::GoEnabledPass,
            Event::PmondReady,
            Event::Tick,
            Event::HostServicesDone { ok: true },
            Event::Tick,
            Event::HeartbeatSoakComplete,
            Event::StateChanged,
            Event::WorkQueueDrained,
        ];
        for event in events {
            let (_, next) = step(stage, event);
            if let Some(next) = next {
                stage = next;
            }
        }
        assert_eq!(stage, Stage::Enabled);
    }

    #[test]
    fn go_enabled_failure_routes_through_failure_back_to_start() {
        let (action, next) = step(Stage::GoEnabledWait, Event::GoEnabledFail);
        assert_eq!(action, Action::EnterFailure);
        assert_eq!(next, Some(Stage::Failure));

        let (_, next) = step(Stage::Failure, Event::Tick);
        assert_eq!(next, Some(Stage::FailureWait));

        let (_, next) = step(Stage::FailureWait, Event::Tick);
        assert_eq!(next, Some(Stage::Start));
    }

    #[test]
    fn timeout_at_any_in_progress_stage_enters_failure() {
        let (action, next) = step(Stage::ServicesStartWait, Event::TimedOut);
        assert_eq!(action, Action::EnterFailure);
        assert_eq!(next, Some(Stage::Failure));
    }

    #[test]
    fn timeout_once_enabled_is_a_no_op() {
        let (action, next) = step(Stage::Enabled, Event::TimedOut);
        assert_eq!(action, Action::None);
        assert_eq!(next, None);
    }

    #[test]
    fn retries_exhausted_publishes_auto_recovery_disabled() {
        let (action, next) = step(Stage::Failure, Event::RetriesExhausted);
        assert_eq!(action, Action::PublishAutoRecoveryDisabled);
        assert_eq!(next, Some(Stage::FailureWait));
    }

    #[test]
    fn reset_progression_without_offline_fails_without_purge() {
        let (action, next) = step(
            Stage::ResetProgression,
            Event::ResetProgressionDone { went_offline: false },
        );
        assert_eq!(action, Action::EnterFailure);
        assert_eq!(next, Some(Stage::Failure));
    }
}
