//! `reset_handler` / `reboot_handler` / `reinstall_handler` / `power_handler`
//! / `powercycle_handler` (spec §4.7): "request -> response-wait ->
//! queue-on-retry -> offline-wait -> done/fail with stage-appropriate
//! timeouts and user-visible task strings." Spec groups these five handlers
//! as one shape, so they share a single stage-advance machine parameterized
//! by [`ActionKind`] rather than five near-identical copies.

use mtce_common::TaskString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Reset,
    Reboot,
    Reinstall,
    PowerOff,
    PowerOn,
    Powercycle,
}

impl ActionKind {
    /// Per-kind retry cap (spec §5 "per-stage retries with fixed caps ...
    /// 3 BMC power-action retries").
    pub fn max_retries(&self) -> u32 {
        match self {
            ActionKind::PowerOff | ActionKind::PowerOn | ActionKind::Powercycle => 3,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Request,
    ResponseWait,
    QueueOnRetry,
    OfflineWait,
    Done,
    Fail,
}

impl Stage {
    pub fn as_task_str(&self, kind: ActionKind) -> TaskString {
        if matches!(self, Stage::Done) {
            return TaskString::None;
        }
        if matches!(self, Stage::Fail) {
            return TaskString::Failed(format!("{:?}", kind).to_lowercase());
        }
        match kind {
            ActionKind::Reset => TaskString::Resetting,
            ActionKind::Reboot => TaskString::Rebooting,
            ActionKind::Reinstall => TaskString::Reinstalling,
            ActionKind::PowerOff => TaskString::PoweringOff,
            ActionKind::PowerOn => TaskString::PoweringOn,
            ActionKind::Powercycle => TaskString::PowerCyclingOff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    ResponseReceived,
    TimedOut,
    WentOffline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    SendRequest,
    ReQueueRequest,
    MarkDone,
    MarkFailed,
}

/// `retries_used` tracks how many times `ResponseWait` has timed out and
/// looped back through `QueueOnRetry`.
pub fn step(
    stage: Stage,
    event: Event,
    kind: ActionKind,
    retries_used: u32,
) -> (Action, Option<Stage>) {
    use Event::*;
    use Stage::*;

    match (stage, event) {
        (Request, Tick) => (Action::SendRequest, Some(ResponseWait)),
        (ResponseWait, ResponseReceived) => (Action::None, Some(OfflineWait)),
        (ResponseWait, TimedOut) => {
            if retries_used < kind.max_retries() {
                (Action::ReQueueRequest, Some(QueueOnRetry))
            } else {
                (Action::MarkFailed, Some(Fail))
            }
        }
        (QueueOnRetry, Tick) => (Action::SendRequest, Some(ResponseWait)),
        (OfflineWait, WentOffline) => (Action::MarkDone, Some(Done)),
        (OfflineWait, TimedOut) => {
            if retries_used < kind.max_retries() {
                (Action::ReQueueRequest, Some(QueueOnRetry))
            } else {
                (Action::MarkFailed, Some(Fail))
            }
        }
        _ => (Action::None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_done() {
        let mut stage = Stage::Request;
        for event in [Event::Tick, Event::ResponseReceived, Event::WentOffline] {
            let (_, next) = step(stage, event, ActionKind::Reboot, 0);
            if let Some(next) = next {
                stage = next;
            }
        }
        assert_eq!(stage, Stage::Done);
    }

    #[test]
    fn response_timeout_retries_until_cap_then_fails() {
        let kind = ActionKind::Reboot;
        let (action, next) = step(Stage::ResponseWait, Event::TimedOut, kind, 0);
        assert_eq!(action, Action::ReQueueRequest);
        assert_eq!(next, Some(Stage::QueueOnRetry));

        let (action, next) = step(Stage::ResponseWait, Event::TimedOut, kind, kind.max_retries());
        assert_eq!(action, Action::MarkFailed);
        assert_eq!(next, Some(Stage::Fail));
    }

    #[test]
    fn power_actions_get_a_three_retry_cap() {
        assert_eq!(ActionKind::Powercycle.max_retries(), 3);
        assert_eq!(ActionKind::Reboot.max_retries(), 2);
    }

    #[test]
    fn offline_wait_timeout_retries_then_fails() {
        let kind = ActionKind::Reset;
        let (action, next) = step(Stage::OfflineWait, Event::TimedOut, kind, kind.max_retries());
        assert_eq!(action, Action::MarkFailed);
        assert_eq!(next, Some(Stage::Fail));
    }
}
