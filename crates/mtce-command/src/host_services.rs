//! Host-services start/stop compound command (spec §4.6): sends a start or
//! stop command and expects two distinct replies — an immediate ACK (a
//! command-received echo) and a later RESULT (status + optional detail
//! string) — each with its own timeout. Storage hosts running a stop in
//! legacy (non-ack-monitor) mode get a ≈90s holdoff after ACK so the
//! storage subsystem can quiesce before PASS is declared (spec §9 open
//! question 4: "preserve both paths").
//!
//! Grounded in `mtcCmdHdlr.cpp`'s `HOST_SERVICES_SEND_CMD` /
//! `HOST_SERVICES_RECV_ACK` / `STORAGE_LOCK_DELAY` /
//! `HOST_SERVICES_WAIT_FOR_RESULT` stages.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage OSD shutdown holdoff, legacy path only (spec §4.6/§9).
pub const STORAGE_LOCK_DELAY: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    SendCmd,
    RecvAck,
    /// Legacy (non-ack-monitor) storage stop only.
    StorageLockDelay,
    WaitForResult,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SendCommand,
    StartAckTimer,
    StartStorageHoldoffTimer,
    StartResultTimer,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    AckReceived,
    AckTimedOut,
    ResultReceived { pass: bool },
    ResultTimedOut,
    StorageHoldoffExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
}

/// Whether this host-services stop uses the ack-monitor RESULT path or
/// the legacy holdoff path (spec §4.6 "for storage hosts executing a stop
/// in legacy mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostServicesConfig {
    pub storage: bool,
    pub stopping: bool,
    /// True if this host's on-host agent supports the ack-monitor RESULT
    /// reply; false means the legacy holdoff path applies.
    pub ack_monitor_capable: bool,
}

#[derive(Debug, Clone)]
pub struct HostServices {
    pub stage: Stage,
    pub config: HostServicesConfig,
}

impl HostServices {
    pub fn new(config: HostServicesConfig) -> Self {
        Self {
            stage: Stage::SendCmd,
            config,
        }
    }

    fn uses_legacy_holdoff(&self) -> bool {
        self.config.storage && self.config.stopping && !self.config.ack_monitor_capable
    }

    pub fn step(&mut self, event: Event) -> (Action, Option<Outcome>) {
        match (self.stage, event) {
            (Stage::SendCmd, _) => {
                self.stage = Stage::RecvAck;
                (Action::SendCommand, None)
            }
            (Stage::RecvAck, Event::AckTimedOut) => {
                self.stage = Stage::Done;
                (Action::None, Some(Outcome::Fail))
            }
            (Stage::RecvAck, Event::AckReceived) => {
                if self.uses_legacy_holdoff() {
                    self.stage = Stage::StorageLockDelay;
                    (Action::StartStorageHoldoffTimer, None)
                } else {
                    self.stage = Stage::WaitForResult;
                    (Action::StartResultTimer, None)
                }
            }
            (Stage::StorageLockDelay, Event::StorageHoldoffExpired) => {
                self.stage = Stage::Done;
                (Action::None, Some(Outcome::Pass))
            }
            (Stage::WaitForResult, Event::ResultReceived { pass }) => {
                self.stage = Stage::Done;
                (Action::None, Some(if pass { Outcome::Pass } else { Outcome::Fail }))
            }
            (Stage::WaitForResult, Event::ResultTimedOut) => {
                self.stage = Stage::Done;
                (Action::None, Some(Outcome::Fail))
            }
            (Stage::Done, _) => (Action::None, None),
            _ => (Action::None, None),
        }
    }
}
