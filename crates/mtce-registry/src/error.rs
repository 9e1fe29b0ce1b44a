//! Registry-specific failure kinds that aren't already covered by
//! `mtce_common::MtceError`'s generic duplicate/reserved-name variants.

use thiserror::Error;

/// Why a lock precondition (spec §4.3 "Semantic-check for lock") failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockPrecheckError {
    #[error("cannot lock controller: peer controller is not enabled and in service")]
    PeerControllerNotReady,
    #[error("cannot lock storage host: no storage redundancy remains")]
    StorageRedundancyLost,
    #[error("cannot lock worker: no target host for instance migration")]
    MigrationNotFeasible,
}
