//! Well-known alarm/log ids (spec §4.10), grounded in `mtcAlarm.h`'s
//! `mtc_alarm_id_enum`.

use serde::{Deserialize, Serialize};

/// The closed set of alarm/log identifiers the core raises against the
/// fault manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmId {
    /// Host administratively locked.
    Lock,
    /// Host configuration failure.
    Config,
    /// Host enable failure.
    Enable,
    /// Board-management controller inaccessible.
    BoardManagement,
    /// Combined-host controller failure (AIO, with active compute).
    CombinedHostController,
    /// Combined-host worker/compute failure (last controller standing).
    CombinedHostWorker,
    /// Hardware sensor alarm, scoped to one sensor (sub-entity).
    Sensor,
    /// Hardware sensor-group alarm, scoped to one sensor group.
    SensorGroup,
    /// Sensor monitoring configuration failure.
    SensorConfig,
    /// Host running in a degraded state (one or more degrade-mask bits set).
    Degraded,
}

impl AlarmId {
    /// Fault-manager alarm identifier string, as it would appear in the
    /// external fault record (`mtcAlarm_getId_str`).
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmId::Lock => "100.101",
            AlarmId::Config => "100.102",
            AlarmId::Enable => "100.103",
            AlarmId::BoardManagement => "100.104",
            AlarmId::CombinedHostController => "100.105",
            AlarmId::CombinedHostWorker => "100.106",
            AlarmId::Sensor => "100.107",
            AlarmId::SensorGroup => "100.108",
            AlarmId::SensorConfig => "100.109",
            AlarmId::Degraded => "100.110",
        }
    }
}
