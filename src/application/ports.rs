//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::{key::FilterKey, record::Record};
use std::fmt::{self, Debug};
use std::time::Instant;

/// Port for obtaining current time.
///
/// Infrastructure provides `SystemClock` for production and `MockClock`
/// for tests that need to move time by hand.
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Error returned by a key store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A new record could not be stored because the store is full
    CapacityExhausted {
        /// Maximum number of keys the store accepts
        limit: usize,
    },
    /// The store could not be prepared for use
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::CapacityExhausted { limit } => {
                write!(f, "key store is full ({} keys)", limit)
            }
            StoreError::Unavailable(reason) => write!(f, "key store unavailable: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {}

/// Port for concurrent per-key record storage.
///
/// Implementations must serialize all access to one key's record while
/// letting operations on different keys run concurrently. Records are never
/// handed out by reference; callers get closure access under the key's lock.
pub trait KeyStore: Send + Sync + Debug {
    /// Prepare the store for use.
    fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Access a record with mutable access, creating it if necessary.
    ///
    /// # Arguments
    /// * `key` - Raw key bytes
    /// * `factory` - Creates the record if the key is new
    /// * `accessor` - Runs while the key's lock is held
    ///
    /// # Errors
    /// Returns `StoreError::CapacityExhausted` if the key is new and cannot be
    /// stored. Existing keys are always reachable.
    fn with_record_mut<F, R>(
        &self,
        key: &[u8],
        factory: impl FnOnce() -> Record,
        accessor: F,
    ) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Record) -> R;

    /// Get the number of stored keys.
    fn len(&self) -> usize;

    /// Check if the store is empty.
    fn is_empty(&self) -> bool;

    /// Release every record.
    ///
    /// Intended for init/teardown boundaries, not for steady-state use.
    fn clear(&self);

    /// Iterate over all records.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&FilterKey, &Record);

    /// Remove records for which the predicate returns false.
    fn retain<F>(&self, f: F)
    where
        F: FnMut(&FilterKey, &mut Record) -> bool;
}
