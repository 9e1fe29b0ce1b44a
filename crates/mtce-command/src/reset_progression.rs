//! Reset progression (spec §4.6, the canonical compound command):
//! on-host reboot request with ACK retries, escalation to a BMC reset,
//! and the offline-check that decides success.
//!
//! Grounded stage-for-stage in `mtcCmdHdlr.cpp`'s
//! `MTC_CMD_STAGE__RESET_PROGRESSION_START` / `REBOOT` / `REBOOT_ACK` /
//! `RESET` / `RESET_ACK` / `OFFLINE_CHECK` / `RESET_PROGRESSION_RETRY`
//! sequence. Modeled as a pure stage-advance function (spec SPEC_FULL §13)
//! so it can be tested without a real timer or socket: the caller
//! (`mtce-fsm`) owns timers and feeds observed events in as `Event`s.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reboot ACK is re-tried this many times before escalating to a BMC
/// reset (spec §4.6 "up to a configured attempt count"; §8 boundary
/// behavior names 5 explicitly).
pub const MAX_REBOOT_ATTEMPTS: u32 = 5;

/// Per-attempt ACK timeout, matching `mtce_messaging::ack::ACK_TIMEOUT`.
/// Duplicated here (rather than a dependency on `mtce-messaging` just for
/// one constant) because this crate models the pure stage machine only.
pub const CMD_RSP_TIMEOUT: Duration = Duration::from_secs(5);

/// Reset-progression stage (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Start,
    /// Reboot request outstanding on every provisioned network, awaiting
    /// a `cmdRsp` ACK (or its timeout).
    RebootAck,
    /// BMC reset has been requested; waiting out `bmc_reset_delay` before
    /// declaring it unavoidable, during which a late offline report still
    /// cancels it (spec §4.6: "a late offline cancels the reset unless
    /// uptime is still high and no mtcAlive is being seen").
    BmcResetDelay,
    /// BMC reset command is in flight against the worker pool.
    BmcResetAck,
    /// Waiting for the host to actually go offline.
    OfflineCheck,
    /// Between attempts, before looping back to `Start`.
    RetryWait,
    Done,
}

/// Why the sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Host confirmed offline; reset progression succeeded.
    Offline,
    /// Attempt cap exhausted without ever seeing the host go offline.
    Exhausted,
}

/// Side effect the caller must perform this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendRebootAllNetworks,
    StartAckTimer,
    RequestBmcReset,
    StartBmcResetDelayTimer { seconds: u64 },
    StartOfflineCheckTimer,
    StartRetryTimer,
    None,
}

/// Observed event driving the next `step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    AckReceived,
    AckTimedOut,
    /// The host reported itself offline (loss-of-life observed).
    WentOffline,
    BmcResetDelayExpired,
    BmcResetAcked,
    RetryTimerExpired,
}

/// The pure state machine. Holds only counters and configuration; all I/O
/// is delegated to the caller via `Action`.
#[derive(Debug, Clone)]
pub struct ResetProgression {
    pub stage: Stage,
    pub reboot_attempts: u32,
    pub bmc_reset_delay_secs: u64,
    /// Snapshot taken when a late offline must be judged against "uptime
    /// still high and no mtcAlive seen" (spec §4.6); caller refreshes this
    /// from the node record before calling `step`.
    pub uptime_secs: u64,
    pub mtc_alive_seen_recently: bool,
}

impl ResetProgression {
    pub fn new(bmc_reset_delay_secs: u64) -> Self {
        Self {
            stage: Stage::Start,
            reboot_attempts: 0,
            bmc_reset_delay_secs,
            uptime_secs: 0,
            mtc_alive_seen_recently: false,
        }
    }

    /// The delay before a BMC reset becomes unavoidable, clamped to zero
    /// per spec §9 open question 3: "the arithmetic can go negative for
    /// short bmc_reset_delay — clamp to zero."
    pub fn bmc_reset_wait(&self) -> u64 {
        let consumed = CMD_RSP_TIMEOUT.as_secs() * MAX_REBOOT_ATTEMPTS as u64;
        self.bmc_reset_delay_secs.saturating_sub(consumed)
    }

    /// Advance one step. Returns the action the caller must perform and,
    /// if the sequence has reached a terminal stage, the outcome.
    pub fn step(&mut self, event: Event) -> (Action, Option<Outcome>) {
        match (self.stage, event) {
            (Stage::Start, _) => {
                self.reboot_attempts += 1;
                self.stage = Stage::RebootAck;
                (
                    Action::SendRebootAllNetworks,
                    None,
                )
            }
            (Stage::RebootAck, Event::WentOffline) => {
                self.stage = Stage::Done;
                (Action::None, Some(Outcome::Offline))
            }
            (Stage::RebootAck, Event::AckReceived) => {
                self.stage = Stage::OfflineCheck;
                (Action::StartOfflineCheckTimer, None)
            }
            (Stage::RebootAck, Event::AckTimedOut) => {
                if self.reboot_attempts < MAX_REBOOT_ATTEMPTS {
                    self.stage = Stage::OfflineCheck;
                    (Action::StartOfflineCheckTimer, None)
                } else {
                    self.stage = Stage::BmcResetDelay;
                    let wait = self.bmc_reset_wait();
                    (Action::StartBmcResetDelayTimer { seconds: wait }, None)
                }
            }
            (Stage::BmcResetDelay, Event::WentOffline) => {
                // Late offline cancels the reset unless uptime is still
                // high and no mtcAlive is being seen on any network, in
                // which case the reset proceeds regardless (spec §4.6).
                if self.uptime_secs > 0 && !self.mtc_alive_seen_recently {
                    self.stage = Stage::Done;
                    (Action::None, Some(Outcome::Offline))
                } else {
                    (Action::None, None)
                }
            }
            (Stage::BmcResetDelay, Event::BmcResetDelayExpired) => {
                self.stage = Stage::BmcResetAck;
                (Action::RequestBmcReset, None)
            }
            (Stage::BmcResetAck, Event::BmcResetAcked) => {
                self.stage = Stage::OfflineCheck;
                (Action::StartOfflineCheckTimer, None)
            }
            (Stage::BmcResetAck, Event::WentOffline) => {
                self.stage = Stage::Done;
                (Action::None, Some(Outcome::Offline))
            }
            (Stage::OfflineCheck, Event::WentOffline) => {
                self.stage = Stage::Done;
                (Action::None, Some(Outcome::Offline))
            }
            (Stage::OfflineCheck, Event::Tick) => {
                if self.reboot_attempts < MAX_REBOOT_ATTEMPTS {
                    self.reboot_attempts += 1;
                    self.stage = Stage::RebootAck;
                    (Action::SendRebootAllNetworks, None)
                } else {
                    self.stage = Stage::RetryWait;
                    (Action::StartRetryTimer, None)
                }
            }
            (Stage::RetryWait, Event::RetryTimerExpired) => {
                self.stage = Stage::Done;
                (Action::None, Some(Outcome::Exhausted))
            }
            (Stage::Done, _) => (Action::None, Some(Outcome::Offline)),
            _ => (Action::None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graceful_late_offline_cancels_reset() {
        let mut rp = ResetProgression::new(60);
        rp.step(Event::Tick); // Start -> RebootAck, sends reboot
        rp.step(Event::AckTimedOut); // escalate attempts until cap below
        // Drive attempts up to the cap so the next ack timeout escalates.
        for _ in 0..(MAX_REBOOT_ATTEMPTS - 1) {
            rp.step(Event::Tick);
            rp.step(Event::AckTimedOut);
        }
        assert_eq!(rp.stage, Stage::BmcResetDelay);

        // Host reports online before the BMC reset delay elapses, with a
        // fresh mtcAlive seen — must cancel.
        rp.uptime_secs = 30;
        rp.mtc_alive_seen_recently = true;
        let (_action, outcome) = rp.step(Event::WentOffline);
        assert_eq!(outcome, None);
        assert_eq!(rp.stage, Stage::BmcResetDelay);
    }

    #[test]
    fn reset_proceeds_if_no_mtc_alive_despite_high_uptime() {
        let mut rp = ResetProgression::new(60);
        rp.stage = Stage::BmcResetDelay;
        rp.uptime_secs = 500;
        rp.mtc_alive_seen_recently = false;
        let (_action, outcome) = rp.step(Event::WentOffline);
        assert_eq!(outcome, Some(Outcome::Offline));
    }

    #[test]
    fn reboot_retry_cap_escalates_to_bmc_reset_with_clamped_delay() {
        let mut rp = ResetProgression::new(5); // shorter than 5*5=25s
        assert_eq!(rp.bmc_reset_wait(), 0);
        rp.stage = Stage::RebootAck;
        rp.reboot_attempts = MAX_REBOOT_ATTEMPTS;
        let (action, _) = rp.step(Event::AckTimedOut);
        assert_eq!(action, Action::StartBmcResetDelayTimer { seconds: 0 });
    }

    #[test]
    fn exhausted_retry_loop_reports_exhausted_not_offline() {
        let mut rp = ResetProgression::new(60);
        rp.stage = Stage::RetryWait;
        let (_action, outcome) = rp.step(Event::RetryTimerExpired);
        assert_eq!(outcome, Some(Outcome::Exhausted));
    }
}
