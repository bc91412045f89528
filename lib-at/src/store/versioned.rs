//! Height-versioned sled tree.
//!
//! Append-only log keyed by `(entity, height)` with "latest version at or
//! before height H" reads. Rolling back to H' deletes every version written
//! above H', which makes those versions invisible again: this is what makes
//! reorg rollback correct for everything stored through this tree.

use sled::{Batch, Tree};

use super::errors::{StorageError, StorageResult};
use super::keys::{parse_version_key, version_key};

/// One logical table of height-versioned entities.
pub struct VersionedTree {
    tree: Tree,
}

impl VersionedTree {
    pub fn new(tree: Tree) -> Self {
        Self { tree }
    }

    /// Write a version of `entity` at `height`. Writing the same
    /// (entity, height) twice overwrites: reprocessing a block is
    /// idempotent by construction.
    pub fn insert(&self, entity: u64, height: u64, value: &[u8]) -> StorageResult<()> {
        let key = version_key(entity, height);
        self.tree
            .insert(&key[..], value)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Latest version of `entity` at or before `at_height`.
    pub fn get(&self, entity: u64, at_height: u64) -> StorageResult<Option<Vec<u8>>> {
        let start = version_key(entity, 0);
        let end = version_key(entity, at_height);
        match self.tree.range(&start[..]..=&end[..]).next_back() {
            Some(Ok((_, value))) => Ok(Some(value.to_vec())),
            Some(Err(e)) => Err(StorageError::Backend(e.to_string())),
            None => Ok(None),
        }
    }

    /// True if `entity` has any version at all, regardless of height.
    pub fn contains_entity(&self, entity: u64) -> StorageResult<bool> {
        let start = version_key(entity, 0);
        let end = version_key(entity, u64::MAX);
        match self.tree.range(&start[..]..=&end[..]).next() {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(StorageError::Backend(e.to_string())),
            None => Ok(false),
        }
    }

    /// Entity ids with at least one version at or before `at_height`,
    /// ascending. Keys sort by (entity, height), so the first key seen for
    /// an entity carries its earliest version height.
    pub fn visible_entities(&self, at_height: u64) -> StorageResult<Vec<u64>> {
        let mut entities = Vec::new();
        let mut current: Option<u64> = None;
        for item in self.tree.iter() {
            let (key, _) = item.map_err(|e| StorageError::Backend(e.to_string()))?;
            let (entity, height) = parse_version_key(&key)
                .ok_or_else(|| StorageError::Corruption(format!("malformed version key: {}", hex::encode(&key))))?;
            if current == Some(entity) {
                continue;
            }
            current = Some(entity);
            if height <= at_height {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Delete every version written above `height`. Returns the number of
    /// versions removed.
    pub fn rollback_to(&self, height: u64) -> StorageResult<usize> {
        let mut batch = Batch::default();
        let mut removed = 0usize;
        for item in self.tree.iter() {
            let (key, _) = item.map_err(|e| StorageError::Backend(e.to_string()))?;
            let (_, version_height) = parse_version_key(&key)
                .ok_or_else(|| StorageError::Corruption(format!("malformed version key: {}", hex::encode(&key))))?;
            if version_height > height {
                batch.remove(&key[..]);
                removed += 1;
            }
        }
        self.tree
            .apply_batch(batch)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(removed)
    }
}
