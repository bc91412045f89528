//! Sled-based AtStore implementation.
//!
//! Two version trees: one for instances (a single version each, written at
//! the deployment height) and one for execution state (one version per
//! executed height). Do not rely on sled-specific features beyond basic KV.

use std::path::Path;

use lib_types::{AccountId, AtId, BlockHeight};
use tracing::debug;

use super::errors::StorageResult;
use super::versioned::VersionedTree;
use super::AtStore;
use crate::instance::AtInstance;
use crate::state::AtState;

// Tree names are protocol. Changing them breaks existing databases.
const TREE_AT_INSTANCES: &str = "at_instance_versions";
const TREE_AT_STATES: &str = "at_state_versions";

/// Durable contract store backed by a sled database.
pub struct SledAtStore {
    _db: sled::Db,
    instances: VersionedTree,
    states: VersionedTree,
    compress: bool,
}

impl SledAtStore {
    /// Open (or create) a store at `path` with gzip-at-rest state images.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db, true)
    }

    /// Open a store with explicit control over image compression.
    pub fn open_with_compression(path: impl AsRef<Path>, compress: bool) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db, compress)
    }

    /// Ephemeral store for tests; removed when dropped.
    pub fn open_temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, true)
    }

    fn from_db(db: sled::Db, compress: bool) -> StorageResult<Self> {
        let instances = VersionedTree::new(db.open_tree(TREE_AT_INSTANCES)?);
        let states = VersionedTree::new(db.open_tree(TREE_AT_STATES)?);
        Ok(Self {
            _db: db,
            instances,
            states,
            compress,
        })
    }

    fn decode_instance(bytes: &[u8]) -> StorageResult<AtInstance> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl AtStore for SledAtStore {
    fn insert_instance(&self, instance: &AtInstance) -> StorageResult<()> {
        let bytes = bincode::serialize(instance)?;
        self.instances
            .insert(instance.id.as_u64(), instance.created_at_height, &bytes)
    }

    fn get_instance(
        &self,
        id: AtId,
        at_height: BlockHeight,
    ) -> StorageResult<Option<AtInstance>> {
        match self.instances.get(id.as_u64(), at_height)? {
            Some(bytes) => Ok(Some(Self::decode_instance(&bytes)?)),
            None => Ok(None),
        }
    }

    fn has_instance(&self, id: AtId) -> StorageResult<bool> {
        self.instances.contains_entity(id.as_u64())
    }

    fn ordered_at_ids(&self, at_height: BlockHeight) -> StorageResult<Vec<AtId>> {
        Ok(self
            .instances
            .visible_entities(at_height)?
            .into_iter()
            .map(AtId::new)
            .collect())
    }

    fn ats_issued_by(
        &self,
        creator: AccountId,
        at_height: BlockHeight,
    ) -> StorageResult<Vec<AtId>> {
        let mut issued = Vec::new();
        for id in self.ordered_at_ids(at_height)? {
            if let Some(instance) = self.get_instance(id, at_height)? {
                if instance.creator == creator {
                    issued.push(id);
                }
            }
        }
        Ok(issued)
    }

    fn is_at_account(&self, account: AccountId) -> StorageResult<bool> {
        self.has_instance(AtId::new(account.as_u64()))
    }

    fn insert_state(&self, height: BlockHeight, state: &AtState) -> StorageResult<()> {
        let bytes = state.to_bytes(self.compress)?;
        self.states.insert(state.at_id.as_u64(), height, &bytes)
    }

    fn get_state(&self, id: AtId, at_height: BlockHeight) -> StorageResult<Option<AtState>> {
        match self.states.get(id.as_u64(), at_height)? {
            Some(bytes) => Ok(Some(AtState::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn rollback_to(&self, height: BlockHeight) -> StorageResult<()> {
        let states = self.states.rollback_to(height)?;
        let instances = self.instances.rollback_to(height)?;
        debug!(
            height,
            states_removed = states,
            instances_removed = instances,
            "rolled back contract storage"
        );
        Ok(())
    }
}

impl std::fmt::Debug for SledAtStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledAtStore")
            .field("compress", &self.compress)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: u64, creator: u64, height: BlockHeight) -> AtInstance {
        AtInstance {
            id: AtId::new(id),
            creator: AccountId::new(creator),
            name: format!("at-{id}"),
            description: String::new(),
            created_at_height: height,
            execution_interval: 10,
            freeze_on_unchanged_balance: false,
            min_activation_balance: 0,
        }
    }

    fn state(id: u64, height: BlockHeight, interval: BlockHeight) -> AtState {
        let mut inst = instance(id, 1, height);
        inst.execution_interval = interval;
        AtState::initial(&inst, vec![id as u8; 64], height)
    }

    #[test]
    fn instances_roll_back_with_their_deployment_height() {
        let store = SledAtStore::open_temporary().unwrap();
        store.insert_instance(&instance(3, 1, 100)).unwrap();
        store.insert_instance(&instance(7, 2, 150)).unwrap();

        assert_eq!(
            store.ordered_at_ids(200).unwrap(),
            vec![AtId::new(3), AtId::new(7)]
        );
        assert_eq!(store.ordered_at_ids(100).unwrap(), vec![AtId::new(3)]);

        store.rollback_to(120).unwrap();
        assert!(!store.has_instance(AtId::new(7)).unwrap());
        assert!(store.is_at_account(AccountId::new(3)).unwrap());
    }

    #[test]
    fn state_reads_are_height_indexed() {
        let store = SledAtStore::open_temporary().unwrap();
        let mut s = state(5, 100, 10);
        store.insert_state(100, &s).unwrap();

        s.mark_executed(110);
        s.set_memory_image(vec![0xAB; 8]);
        store.insert_state(110, &s).unwrap();

        let old = store.get_state(AtId::new(5), 105).unwrap().unwrap();
        assert_eq!(old.next_execution_height, 100);

        let new = store.get_state(AtId::new(5), 110).unwrap().unwrap();
        assert_eq!(new.next_execution_height, 120);
        assert_eq!(new.memory_image(), &[0xAB; 8]);
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let store = SledAtStore::open(dir.path()).unwrap();
            store.insert_instance(&instance(3, 1, 100)).unwrap();
            store.insert_state(100, &state(3, 100, 10)).unwrap();
        }
        let store = SledAtStore::open(dir.path()).unwrap();
        assert!(store.has_instance(AtId::new(3)).unwrap());
        let loaded = store.get_state(AtId::new(3), 100).unwrap().unwrap();
        assert_eq!(loaded.memory_image(), &[3u8; 64]);
    }

    #[test]
    fn issued_by_filters_on_creator() {
        let store = SledAtStore::open_temporary().unwrap();
        store.insert_instance(&instance(3, 1, 10)).unwrap();
        store.insert_instance(&instance(4, 2, 10)).unwrap();
        store.insert_instance(&instance(9, 1, 10)).unwrap();

        assert_eq!(
            store.ats_issued_by(AccountId::new(1), 10).unwrap(),
            vec![AtId::new(3), AtId::new(9)]
        );
    }
}
