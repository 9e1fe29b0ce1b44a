//! Operator-facing task strings (spec §6): "a closed set of short English
//! phrases (≤63 chars), with a few parameterized ... They MUST match the
//! set operators see in dashboards; they are part of the external
//! contract." Grounded in `nodeBase.h`'s `get_*Stages_str` family, which
//! this type replaces with a single table instead of one function per
//! stage enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A task string enqueued via `update_task` (C4). `Display` renders the
/// final ≤63-char operator-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskString {
    None,
    Provisioning,
    Enabling,
    EnablingHeartbeatCheck,
    EnablingResetProgression,
    EnablingGoEnabledWait,
    EnablingHostServices,
    EnablingHeartbeatSoak,
    Disabling,
    DisablingHostServices,
    Rebooting,
    Resetting,
    PowerCyclingOff,
    PowerCyclingOn,
    PoweringOff,
    PoweringOn,
    Reinstalling,
    Recovering,
    /// `"Reboot Failed, retrying (%d of %d)"`.
    RebootFailedRetrying { attempt: u32, max: u32 },
    /// `"Critical Event Power-Cycle %d; recovery in %d minute(s)"`.
    CriticalPowerCycle { count: u32, recovery_minutes: u32 },
    AutoRecoveryDisabledConfig,
    AutoRecoveryDisabledGoenabled,
    AutoRecoveryDisabledServices,
    AutoRecoveryDisabledEnable,
    AutoRecoveryDisabledHeartbeat,
    Degraded(String),
    Failed(String),
    /// Free-form text for cases the closed set above doesn't name yet.
    /// Still clamped to 63 chars by `Display`.
    Custom(String),
}

impl fmt::Display for TaskString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskString::None => String::new(),
            TaskString::Provisioning => "Provisioning".to_string(),
            TaskString::Enabling => "Enabling".to_string(),
            TaskString::EnablingHeartbeatCheck => "Enabling (heartbeat check)".to_string(),
            TaskString::EnablingResetProgression => "Enabling (reset progression)".to_string(),
            TaskString::EnablingGoEnabledWait => "Enabling (waiting on go-enabled)".to_string(),
            TaskString::EnablingHostServices => "Enabling (host services)".to_string(),
            TaskString::EnablingHeartbeatSoak => "Enabling (heartbeat soak)".to_string(),
            TaskString::Disabling => "Disabling".to_string(),
            TaskString::DisablingHostServices => "Disabling (host services)".to_string(),
            TaskString::Rebooting => "Rebooting".to_string(),
            TaskString::Resetting => "Resetting".to_string(),
            TaskString::PowerCyclingOff => "Power-Cycling (power off)".to_string(),
            TaskString::PowerCyclingOn => "Power-Cycling (power on)".to_string(),
            TaskString::PoweringOff => "Powering-Off".to_string(),
            TaskString::PoweringOn => "Powering-On".to_string(),
            TaskString::Reinstalling => "Reinstalling".to_string(),
            TaskString::Recovering => "Recovering".to_string(),
            TaskString::RebootFailedRetrying { attempt, max } => {
                format!("Reboot Failed, retrying ({} of {})", attempt, max)
            }
            TaskString::CriticalPowerCycle {
                count,
                recovery_minutes,
            } => format!(
                "Critical Event Power-Cycle {}; recovery in {} minute(s)",
                count, recovery_minutes
            ),
            TaskString::AutoRecoveryDisabledConfig => {
                "Auto Recovery Disabled (config failures)".to_string()
            }
            TaskString::AutoRecoveryDisabledGoenabled => {
                "Auto Recovery Disabled (go-enabled failures)".to_string()
            }
            TaskString::AutoRecoveryDisabledServices => {
                "Auto Recovery Disabled (service failures)".to_string()
            }
            TaskString::AutoRecoveryDisabledEnable => {
                "Auto Recovery Disabled (enable failures)".to_string()
            }
            TaskString::AutoRecoveryDisabledHeartbeat => {
                "Auto Recovery Disabled (heartbeat failures)".to_string()
            }
            TaskString::Degraded(reason) => format!("Degraded ({})", reason),
            TaskString::Failed(reason) => format!("Failed ({})", reason),
            TaskString::Custom(s) => s.clone(),
        };
        let clamped: String = s.chars().take(63).collect();
        write!(f, "{}", clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reboot_failed_retrying_format_matches_contract() {
        let t = TaskString::RebootFailedRetrying { attempt: 2, max: 5 };
        assert_eq!(t.to_string(), "Reboot Failed, retrying (2 of 5)");
    }

    #[test]
    fn critical_power_cycle_format_matches_contract() {
        let t = TaskString::CriticalPowerCycle {
            count: 3,
            recovery_minutes: 30,
        };
        assert_eq!(
            t.to_string(),
            "Critical Event Power-Cycle 3; recovery in 30 minute(s)"
        );
    }

    #[test]
    fn every_rendering_is_63_chars_or_fewer() {
        let t = TaskString::Custom("x".repeat(200));
        assert_eq!(t.to_string().chars().count(), 63);
    }
}
