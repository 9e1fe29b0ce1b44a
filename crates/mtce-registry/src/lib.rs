//! The node registry (spec §4.3 / component C3): the ordered collection
//! of per-host records, their secondary lookup indices, and the
//! per-personality lock precondition checks.

pub mod error;
pub mod node;
pub mod registry;

pub use error::LockPrecheckError;
pub use node::{InventoryRecord, NodeRecord};
pub use registry::NodeRegistry;
