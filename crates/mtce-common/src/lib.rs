//! Shared types for the cluster node maintenance controller (mtce).
//!
//! This crate holds nothing that owns state by itself: ids, the closed
//! error taxonomy, the admin/oper/avail lifecycle enums, the degrade
//! bit-field and the operator-facing task-string table. Every other
//! `mtce-*` crate depends on this one and nothing circular depends back.

#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod degrade;
pub mod error;
pub mod ids;
pub mod states;
pub mod task;

pub use degrade::DegradeMask;
pub use error::{MtceError, MtceResult};
pub use ids::{EventBase, HandleAllocator, NodeHandle, TimerId};
pub use states::{
    AdminAction, AdminState, AvailStatus, ConfigAction, NodeType, OperState, Personality,
};
pub use task::TaskString;
