//! `bm_handler` (spec §4.7 + §14 supplemented feature): "maintains BMC
//! liveness via a lightweight ping-monitor sub-FSM (idle -> open -> send ->
//! recv -> wait -> close, with fail -> reopen retry). On first accessible
//! state it queries bmc-info and reset-cause; persistent inaccessibility
//! raises a board-management alarm."
//!
//! The ping-monitor stage sequence and retry caps are grounded in
//! `original_source/mtce-common/src/common/pingUtil.h`'s
//! `pingUtil_stage_type` and `PING_MAX_*` constants.

use serde::{Deserialize, Serialize};

/// `PING_MAX_SEND_RETRIES` in the original.
pub const MAX_SEND_RETRIES: u32 = 5;
/// `PING_MAX_RECV_RETRIES` in the original.
pub const MAX_RECV_RETRIES: u32 = 20;
/// Consecutive ping failures before the board-management alarm is raised.
pub const PERSISTENT_FAILURE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PingStage {
    Idle,
    Open,
    Send,
    Recv,
    Wait,
    Close,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingEvent {
    Tick,
    OpenOk,
    OpenFailed,
    SendOk,
    SendFailed,
    ReplyReceived,
    ReplyTimedOut,
    IntervalElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingAction {
    None,
    OpenSocket,
    SendEcho,
    CloseSocket,
    MarkAccessible,
    MarkInaccessible,
}

/// Pure ping-monitor stage-advance function; `send_retries`/`recv_retries`
/// are owned by the caller, same convention as the other sub-FSMs.
pub fn ping_step(
    stage: PingStage,
    event: PingEvent,
    send_retries: u32,
    recv_retries: u32,
) -> (PingAction, Option<PingStage>) {
    use PingEvent::*;
    use PingStage::*;

    match (stage, event) {
        (Idle, IntervalElapsed) => (PingAction::OpenSocket, Some(Open)),
        (Open, OpenOk) => (PingAction::SendEcho, Some(Send)),
        (Open, OpenFailed) => {
            if send_retries < MAX_SEND_RETRIES {
                (PingAction::OpenSocket, Some(Open))
            } else {
                (PingAction::MarkInaccessible, Some(Fail))
            }
        }
        (Send, SendOk) => (PingAction::None, Some(Recv)),
        (Send, SendFailed) => {
            if send_retries < MAX_SEND_RETRIES {
                (PingAction::SendEcho, Some(Send))
            } else {
                (PingAction::MarkInaccessible, Some(Fail))
            }
        }
        (Recv, ReplyReceived) => (PingAction::MarkAccessible, Some(Close)),
        (Recv, ReplyTimedOut) => {
            if recv_retries < MAX_RECV_RETRIES {
                (PingAction::None, Some(Wait))
            } else {
                (PingAction::MarkInaccessible, Some(Fail))
            }
        }
        (Wait, Tick) => (PingAction::None, Some(Recv)),
        (Close, Tick) => (PingAction::CloseSocket, Some(Idle)),
        (Fail, Tick) => (PingAction::CloseSocket, Some(Idle)),
        _ => (PingAction::None, None),
    }
}

/// Board-management liveness across ping-monitor cycles: counts
/// consecutive ping failures and decides when the alarm must be raised
/// (spec: "persistent inaccessibility raises a board-management alarm").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmLiveness {
    pub accessible: bool,
    pub consecutive_failures: u32,
    pub alarmed: bool,
    /// Set once after the first transition into `accessible`, gating the
    /// one-shot bmc-info/reset-cause query (spec: "on first accessible
    /// state it queries bmc-info and reset-cause").
    pub queried_once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    None,
    QueryInfoAndResetCause,
    RaiseBoardManagementAlarm,
    ClearBoardManagementAlarm,
}

impl BmLiveness {
    pub fn new() -> Self {
        Self {
            accessible: false,
            consecutive_failures: 0,
            alarmed: false,
            queried_once: false,
        }
    }

    pub fn on_accessible(&mut self) -> LivenessAction {
        self.consecutive_failures = 0;
        let was_alarmed = self.alarmed;
        self.accessible = true;
        self.alarmed = false;
        if !self.queried_once {
            self.queried_once = true;
            return LivenessAction::QueryInfoAndResetCause;
        }
        if was_alarmed {
            LivenessAction::ClearBoardManagementAlarm
        } else {
            LivenessAction::None
        }
    }

    pub fn on_inaccessible(&mut self) -> LivenessAction {
        self.accessible = false;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if !self.alarmed && self.consecutive_failures >= PERSISTENT_FAILURE_THRESHOLD {
            self.alarmed = true;
            LivenessAction::RaiseBoardManagementAlarm
        } else {
            LivenessAction::None
        }
    }
}

impl Default for BmLiveness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_cycle_runs_idle_through_close() {
        let mut stage = PingStage::Idle;
        for event in [
            PingEvent::IntervalElapsed,
            PingEvent::OpenOk,
            PingEvent::SendOk,
            PingEvent::ReplyReceived,
            PingEvent::Tick,
        ] {
            let (_, next) = ping_step(stage, event, 0, 0);
            if let Some(next) = next {
                stage = next;
            }
        }
        assert_eq!(stage, PingStage::Idle);
    }

    #[test]
    fn send_failure_reopens_up_to_cap_then_fails() {
        let (action, next) = ping_step(PingStage::Send, PingEvent::SendFailed, 0, 0);
        assert_eq!(action, PingAction::SendEcho);
        assert_eq!(next, Some(PingStage::Send));

        let (action, next) =
            ping_step(PingStage::Send, PingEvent::SendFailed, MAX_SEND_RETRIES, 0);
        assert_eq!(action, PingAction::MarkInaccessible);
        assert_eq!(next, Some(PingStage::Fail));
    }

    #[test]
    fn first_accessible_state_triggers_info_query_once() {
        let mut liveness = BmLiveness::new();
        assert_eq!(
            liveness.on_accessible(),
            LivenessAction::QueryInfoAndResetCause
        );
        assert_eq!(liveness.on_accessible(), LivenessAction::None);
    }

    #[test]
    fn persistent_failure_raises_alarm_exactly_once() {
        let mut liveness = BmLiveness::new();
        for _ in 0..(PERSISTENT_FAILURE_THRESHOLD - 1) {
            assert_eq!(liveness.on_inaccessible(), LivenessAction::None);
        }
        assert_eq!(
            liveness.on_inaccessible(),
            LivenessAction::RaiseBoardManagementAlarm
        );
        assert_eq!(liveness.on_inaccessible(), LivenessAction::None);
    }

    #[test]
    fn recovering_after_alarm_clears_it() {
        let mut liveness = BmLiveness::new();
        liveness.on_accessible();
        for _ in 0..PERSISTENT_FAILURE_THRESHOLD {
            liveness.on_inaccessible();
        }
        assert!(liveness.alarmed);
        assert_eq!(
            liveness.on_accessible(),
            LivenessAction::ClearBoardManagementAlarm
        );
    }
}
