//! `recovery_handler` (spec §4.7): "graceful recovery after transient
//! mtcAlive loss: request-mtcAlive with retries; if alive resumes within a
//! window, go-enabled-request/wait -> host-services -> heartbeat-soak ->
//! state-change without full disable; else fall through to full enable."

use serde::{Deserialize, Serialize};

/// Number of `RequestMtcAlive` retries attempted before giving up on
/// graceful recovery and falling back to the full `enable_handler` path.
pub const MAX_MTC_ALIVE_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    RequestMtcAlive,
    MtcAliveWait,
    GoEnabledRequest,
    GoEnabledWait,
    HostServices,
    HeartbeatSoak,
    StateChange,
    Recovered,
    /// Graceful recovery gave up; the caller should re-enter via
    /// `enable_handler::Stage::Start` instead of a variant owned here.
    FallThroughToEnable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    MtcAliveReceived,
    MtcAliveStillMissing,
    GoEnabledPass,
    GoEnabledFail,
    HostServicesDone { ok: bool },
    HeartbeatSoakComplete,
    StateChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    SendRequestMtcAlive,
    SendGoEnabledRequest,
    StartHostServices,
    StartHeartbeatSoak,
    PublishStateChange,
    MarkRecovered,
    FallBackToFullEnable,
}

/// Pure stage-advance function. `retries_used` lets the caller track the
/// retry budget outside this function, matching the other sub-FSMs in
/// `mtce-command`.
pub fn step(stage: Stage, event: Event, retries_used: u32) -> (Action, Option<Stage>) {
    use Event::*;
    use Stage::*;

    match (stage, event) {
        (RequestMtcAlive, Tick) => (Action::SendRequestMtcAlive, Some(MtcAliveWait)),
        (MtcAliveWait, MtcAliveReceived) => {
            (Action::SendGoEnabledRequest, Some(GoEnabledRequest))
        }
        (MtcAliveWait, MtcAliveStillMissing) => {
            if retries_used < MAX_MTC_ALIVE_RETRIES {
                (Action::SendRequestMtcAlive, Some(MtcAliveWait))
            } else {
                (Action::FallBackToFullEnable, Some(FallThroughToEnable))
            }
        }
        (GoEnabledRequest, Tick) => (Action::None, Some(GoEnabledWait)),
        (GoEnabledWait, GoEnabledPass) => (Action::StartHostServices, Some(HostServices)),
        (GoEnabledWait, GoEnabledFail) => {
            (Action::FallBackToFullEnable, Some(FallThroughToEnable))
        }
        (HostServices, HostServicesDone { ok: true }) => {
            (Action::StartHeartbeatSoak, Some(HeartbeatSoak))
        }
        (HostServices, HostServicesDone { ok: false }) => {
            (Action::FallBackToFullEnable, Some(FallThroughToEnable))
        }
        (HeartbeatSoak, HeartbeatSoakComplete) => {
            (Action::PublishStateChange, Some(StateChange))
        }
        (StateChange, StateChanged) => (Action::MarkRecovered, Some(Recovered)),
        _ => (Action::None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alive_resuming_within_window_recovers_without_full_enable() {
        let mut stage = Stage::RequestMtcAlive;
        for event in [
            Event::Tick,
            Event::MtcAliveReceived,
            Event::Tick,
            Event::GoEnabledPass,
            Event::HostServicesDone { ok: true },
            Event::HeartbeatSoakComplete,
            Event::StateChanged,
        ] {
            let (_, next) = step(stage, event, 0);
            if let Some(next) = next {
                stage = next;
            }
        }
        assert_eq!(stage, Stage::Recovered);
    }

    #[test]
    fn exhausting_mtc_alive_retries_falls_through_to_enable() {
        let (action, next) = step(
            Stage::MtcAliveWait,
            Event::MtcAliveStillMissing,
            MAX_MTC_ALIVE_RETRIES,
        );
        assert_eq!(action, Action::FallBackToFullEnable);
        assert_eq!(next, Some(Stage::FallThroughToEnable));
    }

    #[test]
    fn still_within_retry_budget_retries_request() {
        let (action, next) = step(Stage::MtcAliveWait, Event::MtcAliveStillMissing, 1);
        assert_eq!(action, Action::SendRequestMtcAlive);
        assert_eq!(next, Some(Stage::MtcAliveWait));
    }
}
