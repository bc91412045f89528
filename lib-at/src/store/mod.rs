//! Versioned Contract Storage
//!
//! All contract persistence goes through the [`AtStore`] trait.
//!
//! # Data Model Invariants
//!
//! 1. **Versions are append-only**: a write at height H never mutates an
//!    earlier version; history stays queryable.
//! 2. **Reads resolve to the latest version at or before the requested
//!    height**: this is the whole reorg story: rolling back to H' makes
//!    every version above H' invisible again.
//! 3. **Instances are versioned too**: a deployment dropped by a reorg
//!    must disappear with its block, so instances are keyed at their
//!    creation height and roll back with everything else.
//! 4. **Reprocessing a block is idempotent**: writing the same
//!    (entity, height) twice overwrites in place.

pub mod errors;
pub mod keys;
pub mod memory;
pub mod sled_store;
pub mod versioned;

pub use errors::{StorageError, StorageResult};
pub use memory::MemoryAtStore;
pub use sled_store::SledAtStore;
pub use versioned::VersionedTree;

use lib_types::{AccountId, AtId, BlockHeight};

use crate::instance::AtInstance;
use crate::state::AtState;

/// Height-versioned storage for contract instances and execution state.
///
/// Engine code must not know which backend is used; consensus-critical
/// reads always pass the processing height explicitly.
pub trait AtStore: Send + Sync {
    /// Persist a newly deployed instance, versioned at its creation height.
    fn insert_instance(&self, instance: &AtInstance) -> StorageResult<()>;

    /// The instance visible at `at_height`, if deployed by then.
    fn get_instance(&self, id: AtId, at_height: BlockHeight)
        -> StorageResult<Option<AtInstance>>;

    /// True if `id` was ever assigned to a contract on the current chain.
    /// Ids are never reused.
    fn has_instance(&self, id: AtId) -> StorageResult<bool>;

    /// All contract ids visible at `at_height`, ascending by deployment id.
    /// This order is consensus: it is the cross-node execution order.
    fn ordered_at_ids(&self, at_height: BlockHeight) -> StorageResult<Vec<AtId>>;

    /// Contracts deployed by `creator`, visible at `at_height`, ascending.
    fn ats_issued_by(
        &self,
        creator: AccountId,
        at_height: BlockHeight,
    ) -> StorageResult<Vec<AtId>>;

    /// True if `account` is a contract account on the current chain.
    fn is_at_account(&self, account: AccountId) -> StorageResult<bool>;

    /// Write a state version at `height`.
    fn insert_state(&self, height: BlockHeight, state: &AtState) -> StorageResult<()>;

    /// Latest state version at or before `at_height`.
    fn get_state(&self, id: AtId, at_height: BlockHeight) -> StorageResult<Option<AtState>>;

    /// Reorg rollback: hide every version written above `height`.
    fn rollback_to(&self, height: BlockHeight) -> StorageResult<()>;
}
