//! Alarm/log surface (spec §4.10 / component C10).
//!
//! Exposes the closed set of [`AlarmId`]s the core raises against the
//! fault manager, an ordered [`Severity`] scale, and an [`AlarmStore`]
//! tracking current severity per (hostname, id, sub-entity) with
//! idempotent raise/clear semantics. Grounded in `mtcAlarm.h`'s
//! `mtcAlarm_raise` / `mtcAlarm_clear` / severity-keyed helper family.

pub mod id;
pub mod severity;
pub mod store;

pub use id::AlarmId;
pub use severity::Severity;
pub use store::AlarmStore;
