//! Per-host stage handlers and the top-level dispatcher (spec §4.7/§4.8,
//! components C7/C8): the FSM engine that drives every node through its
//! admin-action lifecycle, one pure stage-advance function per handler,
//! sequenced by a dispatcher that owns the only timer/registry/workqueue
//! side effects in the crate.

pub mod context;
pub mod dispatcher;
pub mod fit;
pub mod handlers;
pub mod stage;

pub use context::HandlerContext;
pub use dispatcher::Dispatcher;
pub use fit::FitConfig;
pub use stage::{NodeStageState, StageUnion};
