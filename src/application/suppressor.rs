//! Suppressors: a suppression policy bound to the shared record registry.
//!
//! [`DuplicateSuppressor`] and [`BurstSuppressor`] are the two entry points the
//! filter dispatches to. Each call locates or creates the key's record and
//! runs the policy on it while the store holds that key's lock, so decisions
//! for one key are serialized.

use crate::application::ports::{KeyStore, StoreError};
use crate::application::registry::RecordRegistry;
use crate::domain::policy::{
    BurstPolicy, DuplicatePolicy, PolicyDecision, SuppressionPolicy, Thresholds,
};

/// Applies one suppression policy to records in a shared registry.
#[derive(Clone)]
pub struct Suppressor<S, P>
where
    S: KeyStore + Clone,
    P: SuppressionPolicy,
{
    registry: RecordRegistry<S>,
    policy: P,
}

/// Allows the first occurrence of a key and suppresses repeats in the epoch.
pub type DuplicateSuppressor<S> = Suppressor<S, DuplicatePolicy>;

/// Suppresses keys that turned massive, allows everything else.
pub type BurstSuppressor<S> = Suppressor<S, BurstPolicy>;

impl<S, P> Suppressor<S, P>
where
    S: KeyStore + Clone,
    P: SuppressionPolicy,
{
    /// Bind a policy to a registry.
    pub fn with_policy(registry: RecordRegistry<S>, policy: P) -> Self {
        Self { registry, policy }
    }

    /// Register an observation of `key` and return the policy's decision.
    ///
    /// # Errors
    /// Returns `StoreError` if the key is new and the store cannot hold it.
    pub fn check(&self, key: &[u8]) -> Result<PolicyDecision, StoreError> {
        self.registry
            .with_record(key, |record, now| self.policy.evaluate(record, now))
    }

    /// Register an observation of `key` and tell whether to drop it.
    ///
    /// Empty keys are never suppressed and never reach the store. Store
    /// failures fail open.
    pub fn should_suppress(&self, key: &[u8]) -> bool {
        if key.is_empty() {
            return false;
        }
        matches!(self.check(key), Ok(decision) if decision.is_suppress())
    }

    /// Get the policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Get the registry.
    pub fn registry(&self) -> &RecordRegistry<S> {
        &self.registry
    }
}

impl<S> Suppressor<S, DuplicatePolicy>
where
    S: KeyStore + Clone,
{
    /// Create a duplicate suppressor.
    pub fn new(registry: RecordRegistry<S>, thresholds: Thresholds) -> Self {
        Self::with_policy(registry, DuplicatePolicy::new(thresholds))
    }
}

impl<S> Suppressor<S, BurstPolicy>
where
    S: KeyStore + Clone,
{
    /// Create a burst suppressor.
    pub fn new(registry: RecordRegistry<S>, thresholds: Thresholds) -> Self {
        Self::with_policy(registry, BurstPolicy::new(thresholds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::{AllowReason, SuppressReason};
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::storage::ShardedKeyStore;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn registry() -> (RecordRegistry<Arc<ShardedKeyStore>>, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new(Instant::now()));
        let store = Arc::new(ShardedKeyStore::new());
        (RecordRegistry::new(store, clock.clone()), clock)
    }

    #[test]
    fn test_duplicate_suppressor_basic() {
        let (registry, _clock) = registry();
        let duplicates = DuplicateSuppressor::new(registry, Thresholds::default());

        assert!(!duplicates.should_suppress(b"Test log message"));
        assert!(duplicates.should_suppress(b"Test log message"));
        assert!(!duplicates.should_suppress(b"Different log message"));
    }

    #[test]
    fn test_burst_suppressor_basic() {
        let (registry, _clock) = registry();
        let bursts = BurstSuppressor::new(registry, Thresholds::default());
        let key = b"Test massive log detection";

        assert!(!bursts.should_suppress(key));
        for _ in 0..58 {
            assert!(!bursts.should_suppress(key));
        }
        // 60th occurrence: transition notice
        assert_eq!(
            bursts.check(key),
            Ok(PolicyDecision::Allow(AllowReason::MassiveDetected))
        );
        assert!(bursts.should_suppress(key));
    }

    #[test]
    fn test_empty_key_never_touches_store() {
        let (registry, _clock) = registry();
        let duplicates = DuplicateSuppressor::new(registry.clone(), Thresholds::default());

        assert!(!duplicates.should_suppress(b""));
        assert!(!duplicates.should_suppress(b""));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_suppressors_share_records() {
        let (registry, _clock) = registry();
        let duplicates = DuplicateSuppressor::new(registry.clone(), Thresholds::default());
        let bursts = BurstSuppressor::new(registry.clone(), Thresholds::default());
        let key = b"INFO:shared\n";

        assert!(!bursts.should_suppress(key));
        // The burst call already counted the first occurrence
        assert_eq!(
            duplicates.check(key),
            Ok(PolicyDecision::Suppress(SuppressReason::Duplicate))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_epoch_reset_with_mock_clock() {
        let (registry, clock) = registry();
        let duplicates = DuplicateSuppressor::new(registry, Thresholds::default());
        let key = b"Test log reset";

        assert!(!duplicates.should_suppress(key));
        assert!(duplicates.should_suppress(key));

        clock.advance(Duration::from_secs(3601));
        assert_eq!(
            duplicates.check(key),
            Ok(PolicyDecision::Allow(AllowReason::EpochReset))
        );
        assert!(duplicates.should_suppress(key));
    }

    #[test]
    fn test_capacity_exhausted_fails_open() {
        let clock = Arc::new(MockClock::new(Instant::now()));
        let store = Arc::new(ShardedKeyStore::with_max_keys(1));
        let registry = RecordRegistry::new(store, clock);
        let duplicates = DuplicateSuppressor::new(registry, Thresholds::default());

        assert!(!duplicates.should_suppress(b"INFO:one\n"));
        assert_eq!(
            duplicates.check(b"INFO:two\n"),
            Err(StoreError::CapacityExhausted { limit: 1 })
        );
        // Fail open, every time
        assert!(!duplicates.should_suppress(b"INFO:two\n"));
        assert!(!duplicates.should_suppress(b"INFO:two\n"));
        // Known keys keep working
        assert!(duplicates.should_suppress(b"INFO:one\n"));
    }
}
