//! The alarm/log surface (spec §4.10 / component C10): raise/clear are
//! idempotent, queries return current severity per (hostname, id,
//! sub-entity). Grounded in `mtcAlarm.h`'s `mtcAlarm_raise` /
//! `mtcAlarm_clear` / `mtcAlarm_state` and its severity-keyed
//! warning/minor/major/critical helper family.

use crate::id::AlarmId;
use crate::severity::Severity;
use dashmap::DashMap;
use tracing::{info, warn};

/// Key into the alarm table: a host, an alarm id, and an optional
/// sub-entity (spec §4.10: "sensor alarms carry a sub-entity — sensor or
/// sensor-group name").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AlarmKey {
    hostname: String,
    id: AlarmId,
    sub_entity: Option<String>,
}

/// Current-severity table for every (host, alarm id, sub-entity) the core
/// has ever raised. Clears are idempotent against "absent" and raises are
/// idempotent against the current severity (spec §8 round-trip law).
pub struct AlarmStore {
    current: DashMap<AlarmKey, Severity>,
}

impl AlarmStore {
    pub fn new() -> Self {
        Self {
            current: DashMap::new(),
        }
    }

    fn key(hostname: &str, id: AlarmId, sub_entity: Option<&str>) -> AlarmKey {
        AlarmKey {
            hostname: hostname.to_string(),
            id,
            sub_entity: sub_entity.map(str::to_string),
        }
    }

    /// Current severity for `(hostname, id)` (no sub-entity), or `Clear`
    /// if never raised.
    pub fn state(&self, hostname: &str, id: AlarmId) -> Severity {
        self.state_sub(hostname, id, None)
    }

    /// Current severity for a scoped sub-entity (sensor/sensor-group).
    pub fn state_sub(&self, hostname: &str, id: AlarmId, sub_entity: Option<&str>) -> Severity {
        self.current
            .get(&Self::key(hostname, id, sub_entity))
            .map(|s| *s)
            .unwrap_or(Severity::Clear)
    }

    /// Raise `id` against `hostname` at `severity`. Idempotent: raising
    /// the same severity again is a no-op; raising a different severity
    /// replaces it and logs the transition (spec §4.10 "raises are
    /// idempotent against current severity").
    pub fn raise(&self, hostname: &str, id: AlarmId, severity: Severity) {
        self.raise_sub(hostname, id, None, severity)
    }

    pub fn raise_sub(&self, hostname: &str, id: AlarmId, sub_entity: Option<&str>, severity: Severity) {
        let key = Self::key(hostname, id, sub_entity);
        let changed = match self.current.get(&key) {
            Some(existing) => *existing != severity,
            None => true,
        };
        if changed {
            warn!(hostname, alarm = id.as_str(), sub_entity, %severity, "raising alarm");
            self.current.insert(key, severity);
        }
    }

    /// Clear `id` against `hostname`. Idempotent against an already-clear
    /// (never-raised) alarm.
    pub fn clear(&self, hostname: &str, id: AlarmId) {
        self.clear_sub(hostname, id, None)
    }

    pub fn clear_sub(&self, hostname: &str, id: AlarmId, sub_entity: Option<&str>) {
        let key = Self::key(hostname, id, sub_entity);
        if self.current.remove(&key).is_some() {
            info!(hostname, alarm = id.as_str(), sub_entity, "clearing alarm");
        }
    }

    pub fn warning(&self, hostname: &str, id: AlarmId) {
        self.raise(hostname, id, Severity::Warning);
    }
    pub fn minor(&self, hostname: &str, id: AlarmId) {
        self.raise(hostname, id, Severity::Minor);
    }
    pub fn major(&self, hostname: &str, id: AlarmId) {
        self.raise(hostname, id, Severity::Major);
    }
    pub fn critical(&self, hostname: &str, id: AlarmId) {
        self.raise(hostname, id, Severity::Critical);
    }

    /// A plain structured log entry — not an alarm-table mutation, so it
    /// never affects `state`/`state_sub` (spec §4.10: "log" variants are
    /// distinct from raise/clear).
    pub fn log(&self, hostname: &str, id: AlarmId, detail: &str) {
        info!(hostname, alarm = id.as_str(), detail, "maintenance log");
    }
}

impl Default for AlarmStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_then_clear_returns_to_clear_regardless_of_prior_state() {
        let store = AlarmStore::new();
        store.raise("worker-1", AlarmId::Enable, Severity::Major);
        assert_eq!(store.state("worker-1", AlarmId::Enable), Severity::Major);
        store.clear("worker-1", AlarmId::Enable);
        assert_eq!(store.state("worker-1", AlarmId::Enable), Severity::Clear);
    }

    #[test]
    fn clear_on_never_raised_alarm_is_idempotent() {
        let store = AlarmStore::new();
        store.clear("worker-1", AlarmId::Config);
        assert_eq!(store.state("worker-1", AlarmId::Config), Severity::Clear);
    }

    #[test]
    fn sensor_alarms_are_scoped_per_sub_entity() {
        let store = AlarmStore::new();
        store.raise_sub("worker-1", AlarmId::Sensor, Some("cpu0_temp"), Severity::Critical);
        assert_eq!(
            store.state_sub("worker-1", AlarmId::Sensor, Some("cpu0_temp")),
            Severity::Critical
        );
        assert_eq!(
            store.state_sub("worker-1", AlarmId::Sensor, Some("cpu1_temp")),
            Severity::Clear
        );
    }

    #[test]
    fn raising_same_severity_twice_is_a_no_op() {
        let store = AlarmStore::new();
        store.raise("worker-1", AlarmId::Lock, Severity::Warning);
        store.raise("worker-1", AlarmId::Lock, Severity::Warning);
        assert_eq!(store.state("worker-1", AlarmId::Lock), Severity::Warning);
    }
}
