//! BMC worker (spec §4.5 / component C5): a pool of one detached
//! worker-per-node that executes asynchronous, one-shot, timeout-bounded
//! board-management commands via `ipmitool` or `redfishtool`.

pub mod command;
pub mod passwd;
pub mod worker;

pub use command::{BmcCommand, BmcTarget, Protocol};
pub use passwd::PasswordFile;
pub use worker::{BmcWorkerPool, Stage as WorkerStage, WorkerResult, POST_KILL_WAIT};
