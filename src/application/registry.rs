//! Shared registry of per-key records.
//!
//! The registry pairs a key store with a clock. Both suppressors hold a clone
//! of the same registry, so they read and write the same record for a key.

use crate::application::ports::{Clock, KeyStore, StoreError};
use crate::domain::{key::FilterKey, record::Record};
use std::sync::Arc;
use std::time::Instant;

/// Registry managing all per-key records.
///
/// Generic over the store implementation. In production, use
/// `Arc<ShardedKeyStore>` so clones share one underlying map.
#[derive(Clone)]
pub struct RecordRegistry<S>
where
    S: KeyStore + Clone,
{
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S> RecordRegistry<S>
where
    S: KeyStore + Clone,
{
    /// Create a new registry over a store and a clock.
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Access or create the record for a key with a callback.
    ///
    /// The callback receives the record and the current timestamp, read once
    /// before the key's lock is taken.
    pub fn with_record<F, R>(&self, key: &[u8], f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Record, Instant) -> R,
    {
        let now = self.clock.now();
        self.store
            .with_record_mut(key, || Record::new(now), |record| f(record, now))
    }

    /// Current time according to the registry's clock.
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Clear all tracked state.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Iterate over all records with a callback.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&FilterKey, &Record),
    {
        self.store.for_each(f);
    }

    /// Remove records for which the predicate returns false.
    pub fn cleanup<F>(&self, f: F)
    where
        F: FnMut(&FilterKey, &mut Record) -> bool,
    {
        self.store.retain(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::storage::ShardedKeyStore;
    use std::time::Duration;

    #[test]
    fn test_registry_creation() {
        let store = Arc::new(ShardedKeyStore::new());
        let registry = RecordRegistry::new(store, Arc::new(SystemClock::new()));

        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_with_record_creates_once() {
        let store = Arc::new(ShardedKeyStore::new());
        let registry = RecordRegistry::new(store, Arc::new(SystemClock::new()));

        registry
            .with_record(b"INFO:hello\n", |record, _now| {
                assert_eq!(record.total_count(), 0);
                record.observe(record.first_seen());
            })
            .unwrap();

        registry
            .with_record(b"INFO:hello\n", |record, _now| {
                assert_eq!(record.total_count(), 1);
            })
            .unwrap();

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_new_record_uses_clock_time() {
        let start = Instant::now();
        let clock = Arc::new(MockClock::new(start));
        let store = Arc::new(ShardedKeyStore::new());
        let registry = RecordRegistry::new(store, clock.clone());

        clock.advance(Duration::from_secs(5));
        let first_seen = registry
            .with_record(b"WARN:late\n", |record, now| {
                assert_eq!(record.first_seen(), now);
                record.first_seen()
            })
            .unwrap();

        assert_eq!(first_seen, start + Duration::from_secs(5));
    }

    #[test]
    fn test_clones_share_records() {
        let store = Arc::new(ShardedKeyStore::new());
        let registry = RecordRegistry::new(store, Arc::new(SystemClock::new()));
        let other = registry.clone();

        registry
            .with_record(b"INFO:shared\n", |record, now| record.observe(now))
            .unwrap();
        let count = other
            .with_record(b"INFO:shared\n", |record, _now| record.total_count())
            .unwrap();

        assert_eq!(count, 1);
    }

    #[test]
    fn test_clear_and_cleanup() {
        let store = Arc::new(ShardedKeyStore::new());
        let registry = RecordRegistry::new(store, Arc::new(SystemClock::new()));

        for i in 0..10 {
            let key = format!("INFO:message {}\n", i);
            registry
                .with_record(key.as_bytes(), |record, now| record.observe(now))
                .unwrap();
        }
        assert_eq!(registry.len(), 10);

        registry.cleanup(|key, _record| key.as_bytes() != b"INFO:message 0\n");
        assert_eq!(registry.len(), 9);

        registry.clear();
        assert!(registry.is_empty());
    }
}
