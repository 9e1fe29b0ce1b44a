//! Command FSM (spec §4.6 / component C6): compound maintenance commands
//! whose stages span many seconds or minutes, each with its own per-kind
//! sub-FSM, sequenced through a per-node FIFO.

pub mod fifo;
pub mod host_services;
pub mod hostname_modify;
pub mod reset_progression;

pub use fifo::{CommandDone, CommandEntry, CommandFifo};
use serde::{Deserialize, Serialize};

/// Which compound command an entry in the work FIFO represents (spec §4.6:
/// "reset progression, host-services start/stop, hostname modify").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    ResetProgression,
    HostServicesStart { storage: bool },
    HostServicesStop { storage: bool },
    HostnameModify { old_hostname: String, new_hostname: String },
}

/// Terminal status an entry in the done FIFO carries (spec §4.6 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Pass,
    Fail,
}
