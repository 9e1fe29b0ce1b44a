//! BMC command vocabulary and the mapping from (protocol, command) to a
//! concrete shell invocation (spec §4.5).
//!
//! Grounded in `mtcIpmiUtil.cpp`'s `getIpmiCmd_str` table and its
//! `ipmitool_thread_info.command` dispatch, which maps the same closed set
//! of command codes to `ipmitool`/`redfishtool` argv. Two protocols are
//! supported; `Protocol::argv` is the only place that knows the concrete
//! binary and flags.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// One of the nine BMC operations named in spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BmcCommand {
    BmcQuery,
    BmcInfo,
    PowerOn,
    PowerOff,
    PowerReset,
    PowerCycle,
    PowerStatus,
    RestartCause,
    BootdevPxe,
}

impl BmcCommand {
    /// Short name, used in log lines and status strings the way
    /// `getIpmiCmd_str` did.
    pub fn as_str(&self) -> &'static str {
        match self {
            BmcCommand::BmcQuery => "bmc-query",
            BmcCommand::BmcInfo => "bmc-info",
            BmcCommand::PowerOn => "power-on",
            BmcCommand::PowerOff => "power-off",
            BmcCommand::PowerReset => "power-reset",
            BmcCommand::PowerCycle => "power-cycle",
            BmcCommand::PowerStatus => "power-status",
            BmcCommand::RestartCause => "restart-cause",
            BmcCommand::BootdevPxe => "bootdev-pxe",
        }
    }

    /// For `BmcInfo`, the command's result lands in the per-command
    /// output file (`data` carries the filename); every other command's
    /// result is stored inline as text (spec §4.5).
    pub fn result_is_file(&self) -> bool {
        matches!(self, BmcCommand::BmcInfo)
    }
}

/// The two supported BMC access protocols (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Legacy CLI tool (`ipmitool`).
    Ipmitool,
    /// Redfish CLI tool (`redfishtool`).
    Redfish,
}

/// Credentials and address snapshot taken at LAUNCH (spec §4.5 "extra-info
/// struct"); never mutated again until the worker is consumed.
#[derive(Debug, Clone)]
pub struct BmcTarget {
    pub bm_ip: String,
    pub bm_un: String,
    pub protocol: Protocol,
}

impl Protocol {
    fn binary(&self) -> &'static str {
        match self {
            Protocol::Ipmitool => "ipmitool",
            Protocol::Redfish => "redfishtool",
        }
    }

    /// Build the argv for `command` against `target`, reading the BMC
    /// password from `passwd_file` rather than putting it on the command
    /// line (the original passes a `-f <passwd_file>` style option for the
    /// same reason: credentials must never show up in `ps`).
    pub fn argv(&self, target: &BmcTarget, command: BmcCommand, passwd_file: &Path) -> Vec<String> {
        let mut argv = vec![self.binary().to_string()];
        match self {
            Protocol::Ipmitool => {
                argv.extend([
                    "-I".into(),
                    "lanplus".into(),
                    "-H".into(),
                    target.bm_ip.clone(),
                    "-U".into(),
                    target.bm_un.clone(),
                    "-f".into(),
                    passwd_file.display().to_string(),
                ]);
                match command {
                    BmcCommand::BmcQuery | BmcCommand::BmcInfo => {
                        argv.extend(["mc".into(), "info".into()])
                    }
                    BmcCommand::PowerOn => argv.extend(["chassis".into(), "power".into(), "on".into()]),
                    BmcCommand::PowerOff => argv.extend(["chassis".into(), "power".into(), "off".into()]),
                    BmcCommand::PowerReset => argv.extend(["chassis".into(), "power".into(), "reset".into()]),
                    BmcCommand::PowerCycle => argv.extend(["chassis".into(), "power".into(), "cycle".into()]),
                    BmcCommand::PowerStatus => argv.extend(["chassis".into(), "power".into(), "status".into()]),
                    BmcCommand::RestartCause => argv.extend(["mc".into(), "info".into()]),
                    BmcCommand::BootdevPxe => {
                        argv.extend(["chassis".into(), "bootdev".into(), "pxe".into()])
                    }
                }
            }
            Protocol::Redfish => {
                argv.extend([
                    "-r".into(),
                    target.bm_ip.clone(),
                    "-u".into(),
                    target.bm_un.clone(),
                    "-f".into(),
                    passwd_file.display().to_string(),
                ]);
                match command {
                    BmcCommand::BmcQuery | BmcCommand::BmcInfo => {
                        argv.extend(["raw".into(), "GET".into(), "/redfish/v1/Systems".into()])
                    }
                    BmcCommand::PowerOn => {
                        argv.extend(["raw".into(), "POST".into(), "/redfish/v1/Systems/1/Actions/ComputerSystem.Reset".into(), "-d".into(), "{\"ResetType\":\"On\"}".into()])
                    }
                    BmcCommand::PowerOff => {
                        argv.extend(["raw".into(), "POST".into(), "/redfish/v1/Systems/1/Actions/ComputerSystem.Reset".into(), "-d".into(), "{\"ResetType\":\"ForceOff\"}".into()])
                    }
                    BmcCommand::PowerReset => {
                        argv.extend(["raw".into(), "POST".into(), "/redfish/v1/Systems/1/Actions/ComputerSystem.Reset".into(), "-d".into(), "{\"ResetType\":\"ForceRestart\"}".into()])
                    }
                    BmcCommand::PowerCycle => {
                        argv.extend(["raw".into(), "POST".into(), "/redfish/v1/Systems/1/Actions/ComputerSystem.Reset".into(), "-d".into(), "{\"ResetType\":\"PowerCycle\"}".into()])
                    }
                    BmcCommand::PowerStatus => {
                        argv.extend(["raw".into(), "GET".into(), "/redfish/v1/Systems/1".into()])
                    }
                    BmcCommand::RestartCause => {
                        argv.extend(["raw".into(), "GET".into(), "/redfish/v1/Systems/1".into()])
                    }
                    BmcCommand::BootdevPxe => argv.extend([
                        "raw".into(),
                        "PATCH".into(),
                        "/redfish/v1/Systems/1".into(),
                        "-d".into(),
                        "{\"Boot\":{\"BootSourceOverrideTarget\":\"Pxe\"}}".into(),
                    ]),
                }
            }
        }
        argv
    }
}

/// Substrings the original looks for in tool output to confirm a power
/// command actually took effect (`IPMITOOL_POWER_*_RESP` in
/// `mtcIpmiUtil.cpp`), rather than trusting a zero exit code alone.
pub fn expected_response_marker(command: BmcCommand, protocol: Protocol) -> Option<&'static str> {
    match (protocol, command) {
        (Protocol::Ipmitool, BmcCommand::PowerOn) => Some("Up/On"),
        (Protocol::Ipmitool, BmcCommand::PowerOff) => Some("Down/Off"),
        (Protocol::Ipmitool, BmcCommand::PowerReset) => Some("reset"),
        (Protocol::Ipmitool, BmcCommand::PowerCycle) => Some("cycle"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn ipmitool_argv_never_embeds_password() {
        let target = BmcTarget {
            bm_ip: "10.0.0.5".into(),
            bm_un: "root".into(),
            protocol: Protocol::Ipmitool,
        };
        let argv = Protocol::Ipmitool.argv(&target, BmcCommand::PowerOn, &PathBuf::from("/tmp/pw"));
        assert!(argv.iter().all(|a| a != "hunter2"));
        assert!(argv.contains(&"-f".to_string()));
    }

    #[test]
    fn bmc_info_result_lands_in_a_file() {
        assert!(BmcCommand::BmcInfo.result_is_file());
        assert!(!BmcCommand::PowerOn.result_is_file());
    }
}
