//! Command and event codes exchanged with the on-host agent (spec §4.2).

use serde::{Deserialize, Serialize};

/// Commands the core sends to an on-host agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostCommand {
    /// Fire-and-forget: success is proven only by loss-of-life + time, not
    /// by any reply.
    Reboot,
    /// Fire-and-forget, skipping the on-host reboot banner/delay.
    LazyReboot,
    Wipedisk,
    LockedNotice,
    UnlockedNotice,
    /// Elicits an immediate mtcAlive reply on every provisioned network.
    RequestMtcAlive,
    GoEnabledRequest { subfunction: bool },
    HostServicesStart { storage: bool },
    HostServicesStop { storage: bool },
}

impl HostCommand {
    /// Numeric code carried in `Message::cmd`. Stable across releases —
    /// this is the actual wire contract, not just a label.
    pub fn code(&self) -> u32 {
        match self {
            HostCommand::Reboot => 1,
            HostCommand::LazyReboot => 2,
            HostCommand::Wipedisk => 3,
            HostCommand::LockedNotice => 4,
            HostCommand::UnlockedNotice => 5,
            HostCommand::RequestMtcAlive => 6,
            HostCommand::GoEnabledRequest { .. } => 7,
            HostCommand::HostServicesStart { .. } => 8,
            HostCommand::HostServicesStop { .. } => 9,
        }
    }

    /// True for commands whose side effects matter enough that the sender
    /// runs the ACK sub-protocol (spec §4.2: "commands with side effects
    /// ... have an ACK sub-protocol"). `Reboot`/`LazyReboot` are explicitly
    /// fire-and-forget and never ACKed.
    pub fn expects_ack(&self) -> bool {
        !matches!(self, HostCommand::Reboot | HostCommand::LazyReboot)
    }
}

/// Events received back from an on-host agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostEvent {
    MtcAlive {
        uptime_secs: u64,
        health: u32,
        flags: u32,
        personality: String,
        cluster_host_ip: Option<String>,
    },
    GoEnabled {
        subfunction: bool,
        pass: bool,
    },
    /// `cmd` is the numeric code of the command this is a reply to, so the
    /// ACK waiter can match it against the outstanding request.
    CommandResponse {
        cmd: u32,
        status: i32,
        status_string: Option<String>,
    },
}
