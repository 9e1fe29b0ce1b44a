//! Node lifecycle enums (spec §3), grounded in `nodeBase.h`'s
//! `mtc_nodeAdminAction_enum` / `mtc_nodeAdminState_enum` /
//! `mtc_nodeOperState_enum` / `mtc_nodeAvailStatus_enum`.

use serde::{Deserialize, Serialize};

/// The administrative action currently queued (or running) for a node.
/// Exactly one is "current" per node at a time; further requests append to
/// the node's `adminAction_todo_list` (see `mtce-registry::NodeRecord`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminAction {
    /// No action queued.
    None,
    Lock,
    Unlock,
    Reset,
    Reboot,
    Reinstall,
    PowerOff,
    PowerOn,
    Recover,
    Delete,
    Powercycle,
    Add,
    Swact,
    ForceLock,
    ForceSwact,
    /// Internal FSM action: drive the host through `enable_handler`.
    Enable,
    /// Internal FSM action: enable only the AIO worker subfunction.
    EnableSubf,
}

impl Default for AdminAction {
    fn default() -> Self {
        AdminAction::None
    }
}

/// Administrative state (locked/unlocked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    Locked,
    Unlocked,
}

/// Operational state (enabled/disabled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    Disabled,
    Enabled,
}

/// Availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvailStatus {
    NotInstalled,
    Available,
    Degraded,
    Failed,
    Intest,
    PoweredOff,
    Offline,
    Online,
    Offduty,
}

impl AvailStatus {
    /// Operator-facing label, as surfaced through inventory (spec §6).
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailStatus::NotInstalled => "not-installed",
            AvailStatus::Available => "available",
            AvailStatus::Degraded => "degraded",
            AvailStatus::Failed => "failed",
            AvailStatus::Intest => "intest",
            AvailStatus::PoweredOff => "powered-off",
            AvailStatus::Offline => "offline",
            AvailStatus::Online => "online",
            AvailStatus::Offduty => "offduty",
        }
    }
}

/// Sysinv-driven configuration action (password install/change).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigAction {
    None,
    InstallPasswd,
    ChangePasswd,
    ChangePasswdAgain,
}

impl Default for ConfigAction {
    fn default() -> Self {
        ConfigAction::None
    }
}

/// Host personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Controller,
    Worker,
    Storage,
}

impl Personality {
    /// True if `hostname` is one of the reserved names that are only valid
    /// for this personality (spec §4.3 "Reserved-name rules").
    pub fn reserved_name_ok(&self, hostname: &str) -> bool {
        match hostname {
            "controller-0" | "controller-1" => matches!(self, Personality::Controller),
            "storage-0" => matches!(self, Personality::Storage),
            _ => true,
        }
    }
}

bitflags_like! {
    /// Node-type bitmask. Modeled on the original's plain `#define` bit
    /// constants (see spec §9 design note on avoiding new dependencies
    /// where the corpus itself just uses integer constants).
    pub struct NodeType: u32 {
        const CONTROLLER = 0x0000_0001;
        const WORKER      = 0x0000_0002;
        const STORAGE     = 0x0000_0004;
        const AIO         = 0x0000_0008;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_require_matching_personality() {
        assert!(Personality::Controller.reserved_name_ok("controller-0"));
        assert!(!Personality::Worker.reserved_name_ok("controller-0"));
        assert!(Personality::Storage.reserved_name_ok("storage-0"));
        assert!(!Personality::Controller.reserved_name_ok("storage-0"));
        assert!(Personality::Worker.reserved_name_ok("worker-7"));
    }

    #[test]
    fn node_type_bits_compose() {
        let aio = NodeType::CONTROLLER | NodeType::WORKER;
        assert!(aio.contains(NodeType::CONTROLLER));
        assert!(aio.contains(NodeType::WORKER));
        assert!(!aio.contains(NodeType::STORAGE));
    }
}
