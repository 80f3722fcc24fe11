//! Storage implementation for per-key records.
//!
//! Provides concurrent, sharded storage keyed by raw log content.

use crate::application::ports::{KeyStore, StoreError};
use crate::domain::{key::FilterKey, record::Record};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

type RecordMap = DashMap<FilterKey, Record, ahash::RandomState>;

/// Thread-safe sharded record store backed by DashMap.
///
/// Each shard has its own lock, so decisions for keys in different shards
/// run in parallel and decisions for one key are serialized. Existing keys are
/// looked up by `&[u8]` without allocating; a key is copied into the map only
/// the first time it is seen.
///
/// An optional `max_keys` bound caps memory use. Once reached, new keys are
/// rejected with [`StoreError::CapacityExhausted`] while known keys keep
/// working. The bound is soft under contention: concurrent inserts into
/// different shards may overshoot it by a few keys.
#[derive(Debug)]
pub struct ShardedKeyStore {
    map: RecordMap,
    max_keys: Option<usize>,
}

impl ShardedKeyStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(ahash::RandomState::new()),
            max_keys: None,
        }
    }

    /// Create a store that holds at most `max_keys` records.
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            map: DashMap::with_hasher(ahash::RandomState::new()),
            max_keys: Some(max_keys),
        }
    }

    /// Get the key limit, if any.
    pub fn max_keys(&self) -> Option<usize> {
        self.max_keys
    }

    /// Check if a key is tracked.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Get a copy of the record for a key.
    pub fn get(&self, key: &[u8]) -> Option<Record> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    fn at_capacity(&self) -> Option<usize> {
        self.max_keys.filter(|&limit| self.map.len() >= limit)
    }
}

impl Default for ShardedKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for ShardedKeyStore {
    fn with_record_mut<F, R>(
        &self,
        key: &[u8],
        factory: impl FnOnce() -> Record,
        accessor: F,
    ) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Record) -> R,
    {
        // Hot path: the key exists, no allocation
        if let Some(mut record) = self.map.get_mut(key) {
            return Ok(accessor(record.value_mut()));
        }

        // Checked before taking the shard lock; len() locks every shard
        if let Some(limit) = self.at_capacity() {
            return Err(StoreError::CapacityExhausted { limit });
        }

        let mut record = match self.map.entry(FilterKey::from(key)) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => entry.insert(factory()),
        };
        Ok(accessor(record.value_mut()))
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn clear(&self) {
        self.map.clear()
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&FilterKey, &Record),
    {
        for entry in self.map.iter() {
            f(entry.key(), entry.value());
        }
    }

    fn retain<F>(&self, f: F)
    where
        F: FnMut(&FilterKey, &mut Record) -> bool,
    {
        self.map.retain(f);
    }
}

// Implement KeyStore for Arc<ShardedKeyStore> so registry clones share one map
impl KeyStore for Arc<ShardedKeyStore> {
    fn initialize(&self) -> Result<(), StoreError> {
        (**self).initialize()
    }

    fn with_record_mut<F, R>(
        &self,
        key: &[u8],
        factory: impl FnOnce() -> Record,
        accessor: F,
    ) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Record) -> R,
    {
        (**self).with_record_mut(key, factory, accessor)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&FilterKey, &Record),
    {
        (**self).for_each(f)
    }

    fn retain<F>(&self, f: F)
    where
        F: FnMut(&FilterKey, &mut Record) -> bool,
    {
        (**self).retain(f)
    }
}
