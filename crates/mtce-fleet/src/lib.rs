//! Fleet-level controllers (spec §4.9 / component C9): MNFA, dead-office
//! recovery, the heartbeat-event consumer and the service-readiness
//! coordinator, plus the auto-recovery threshold machinery that gates the
//! enable handler's retry loop.
//!
//! Each sub-controller here follows the same shape as `mtce-fsm`'s stage
//! handlers (spec §13): a plain struct or pure function, no timer or
//! socket access of its own. The daemon's fleet-dispatch pass (§4.8 "at
//! the fleet level the dispatcher also advances MNFA, DOR, the heartbeat
//! event consumer") owns the `NodeRegistry`/`TimerService` handles and
//! feeds these controllers the facts they need.

pub mod auto_recovery;
pub mod dor;
pub mod heartbeat;
pub mod mnfa;
pub mod readiness;

pub use auto_recovery::{AutoRecoveryTracker, Cause as AutoRecoveryCause};
pub use dor::DorController;
pub use heartbeat::{manage_heartbeat_degrade, manage_heartbeat_failure, manage_heartbeat_minor, HbsFailureAction, HeartbeatEvent};
pub use mnfa::{Interface as HeartbeatInterface, MnfaController, ThresholdKind as MnfaThresholdKind};
pub use readiness::{FleetSnapshot, PeerService, ReadinessCoordinator};
