//! Mock key store for testing initialization failures.

use crate::application::ports::{KeyStore, StoreError};
use crate::domain::{key::FilterKey, record::Record};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Key store that refuses to initialize.
///
/// Every record access is counted, so a test can check that a filter whose
/// `init()` failed never reaches the store.
///
/// # Examples
///
/// ```
/// use tracing_dedup::infrastructure::mocks::MockUnavailableStore;
/// use tracing_dedup::KeyStore;
///
/// let store = MockUnavailableStore::new("volume offline");
/// assert!(store.initialize().is_err());
/// assert_eq!(store.accesses(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockUnavailableStore {
    reason: String,
    accesses: Arc<AtomicUsize>,
}

impl MockUnavailableStore {
    /// Create a store that fails with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            accesses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of record accesses so far, shared across clones.
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::Relaxed)
    }

    fn unavailable(&self) -> StoreError {
        StoreError::Unavailable(self.reason.clone())
    }
}

impl KeyStore for MockUnavailableStore {
    fn initialize(&self) -> Result<(), StoreError> {
        Err(self.unavailable())
    }

    fn with_record_mut<F, R>(
        &self,
        _key: &[u8],
        _factory: impl FnOnce() -> Record,
        _accessor: F,
    ) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Record) -> R,
    {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        Err(self.unavailable())
    }

    fn len(&self) -> usize {
        0
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn clear(&self) {}

    fn for_each<F>(&self, _f: F)
    where
        F: FnMut(&FilterKey, &Record),
    {
    }

    fn retain<F>(&self, _f: F)
    where
        F: FnMut(&FilterKey, &mut Record) -> bool,
    {
    }
}
