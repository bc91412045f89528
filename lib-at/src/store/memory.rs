//! In-memory AtStore.
//!
//! Sorted-map rendition of the versioned-store contract: a `BTreeMap` keyed
//! by `(entity, height)` gives "latest version ≤ height" via a range scan,
//! the same shape the sled trees use on disk. Used by tests and light
//! tooling; behavior must match `SledAtStore` exactly.

use std::collections::BTreeMap;
use std::sync::Mutex;

use lib_types::{AccountId, AtId, BlockHeight};

use super::errors::StorageResult;
use super::AtStore;
use crate::instance::AtInstance;
use crate::state::AtState;

#[derive(Default)]
struct Inner {
    instances: BTreeMap<(u64, BlockHeight), AtInstance>,
    states: BTreeMap<(u64, BlockHeight), AtState>,
}

/// Volatile contract store with the same semantics as the sled backend.
#[derive(Default)]
pub struct MemoryAtStore {
    inner: Mutex<Inner>,
}

impl MemoryAtStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn latest_at_or_before<V: Clone>(
    map: &BTreeMap<(u64, BlockHeight), V>,
    entity: u64,
    at_height: BlockHeight,
) -> Option<V> {
    map.range((entity, 0)..=(entity, at_height))
        .next_back()
        .map(|(_, v)| v.clone())
}

impl AtStore for MemoryAtStore {
    fn insert_instance(&self, instance: &AtInstance) -> StorageResult<()> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.instances.insert(
            (instance.id.as_u64(), instance.created_at_height),
            instance.clone(),
        );
        Ok(())
    }

    fn get_instance(
        &self,
        id: AtId,
        at_height: BlockHeight,
    ) -> StorageResult<Option<AtInstance>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(latest_at_or_before(&inner.instances, id.as_u64(), at_height))
    }

    fn has_instance(&self, id: AtId) -> StorageResult<bool> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(latest_at_or_before(&inner.instances, id.as_u64(), u64::MAX).is_some())
    }

    fn ordered_at_ids(&self, at_height: BlockHeight) -> StorageResult<Vec<AtId>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut ids = Vec::new();
        let mut current: Option<u64> = None;
        for (entity, height) in inner.instances.keys() {
            if current == Some(*entity) {
                continue;
            }
            current = Some(*entity);
            if *height <= at_height {
                ids.push(AtId::new(*entity));
            }
        }
        Ok(ids)
    }

    fn ats_issued_by(
        &self,
        creator: AccountId,
        at_height: BlockHeight,
    ) -> StorageResult<Vec<AtId>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut issued = Vec::new();
        for ((entity, height), instance) in inner.instances.iter() {
            if *height <= at_height && instance.creator == creator {
                issued.push(AtId::new(*entity));
            }
        }
        Ok(issued)
    }

    fn is_at_account(&self, account: AccountId) -> StorageResult<bool> {
        self.has_instance(AtId::new(account.as_u64()))
    }

    fn insert_state(&self, height: BlockHeight, state: &AtState) -> StorageResult<()> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .states
            .insert((state.at_id.as_u64(), height), state.clone());
        Ok(())
    }

    fn get_state(&self, id: AtId, at_height: BlockHeight) -> StorageResult<Option<AtState>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(latest_at_or_before(&inner.states, id.as_u64(), at_height))
    }

    fn rollback_to(&self, height: BlockHeight) -> StorageResult<()> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.states.retain(|(_, h), _| *h <= height);
        inner.instances.retain(|(_, h), _| *h <= height);
        Ok(())
    }
}
