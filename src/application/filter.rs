//! Decision façade for the log filter.
//!
//! `LogFilter` owns the two suppressors and routes each key to one of them
//! based on the current [`FilterMode`]:
//!
//! - `Plain`: only the burst rule runs, ordinary duplicates pass.
//! - `Filtering`: the duplicate rule runs, which also detects bursts.
//!
//! Switching modes never touches stored records, so window and epoch
//! counters carry over. Every failure inside a decision fails open: an
//! over-suppressed log is worse than a repeated one.

use crate::application::metrics::Metrics;
use crate::application::ports::{KeyStore, StoreError};
use crate::application::registry::RecordRegistry;
use crate::application::suppressor::{BurstSuppressor, DuplicateSuppressor};
use crate::domain::mode::FilterMode;
use crate::domain::policy::{PolicyDecision, Thresholds};
use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::dispatcher;
use tracing::subscriber::NoSubscriber;

/// Final answer for one log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Write the log
    Allow,
    /// Drop the log
    Suppress,
}

impl Verdict {
    /// Check if this verdict is Suppress.
    pub fn is_suppress(&self) -> bool {
        matches!(self, Verdict::Suppress)
    }
}

impl From<PolicyDecision> for Verdict {
    fn from(decision: PolicyDecision) -> Self {
        match decision {
            PolicyDecision::Allow(_) => Verdict::Allow,
            PolicyDecision::Suppress(_) => Verdict::Suppress,
        }
    }
}

/// Error returned when the filter cannot be initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The key store failed to initialize
    Store(StoreError),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::Store(e) => write!(f, "failed to initialize log filter: {}", e),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for InitError {
    fn from(e: StoreError) -> Self {
        InitError::Store(e)
    }
}

#[derive(Debug)]
struct FilterState {
    mode: AtomicU8,
    initialized: AtomicBool,
    /// Set once a store failure has been reported, until the next init
    capacity_warned: AtomicBool,
}

/// Concurrent duplicate and massive-log filter.
///
/// Clones share the store, mode, lifecycle state and metrics.
///
/// # Example
/// ```
/// use tracing_dedup::{FilterMode, LogFilter, RecordRegistry, ShardedKeyStore, SystemClock, Thresholds, Verdict};
/// use std::sync::Arc;
///
/// let registry = RecordRegistry::new(Arc::new(ShardedKeyStore::new()), Arc::new(SystemClock::new()));
/// let filter = LogFilter::new(registry, Thresholds::default(), FilterMode::Filtering);
/// filter.init().unwrap();
///
/// assert_eq!(filter.decide(b"INFO:hello\n"), Verdict::Allow);
/// assert_eq!(filter.decide(b"INFO:hello\n"), Verdict::Suppress);
///
/// filter.teardown();
/// ```
#[derive(Clone)]
pub struct LogFilter<S>
where
    S: KeyStore + Clone,
{
    registry: RecordRegistry<S>,
    duplicates: DuplicateSuppressor<S>,
    bursts: BurstSuppressor<S>,
    thresholds: Thresholds,
    state: Arc<FilterState>,
    metrics: Metrics,
}

impl<S> LogFilter<S>
where
    S: KeyStore + Clone,
{
    /// Create a filter over a registry.
    ///
    /// The filter allows everything until [`init`](Self::init) succeeds.
    pub fn new(registry: RecordRegistry<S>, thresholds: Thresholds, mode: FilterMode) -> Self {
        Self {
            duplicates: DuplicateSuppressor::new(registry.clone(), thresholds),
            bursts: BurstSuppressor::new(registry.clone(), thresholds),
            registry,
            thresholds,
            state: Arc::new(FilterState {
                mode: AtomicU8::new(mode as u8),
                initialized: AtomicBool::new(false),
                capacity_warned: AtomicBool::new(false),
            }),
            metrics: Metrics::new(),
        }
    }

    /// Prepare the store and start filtering.
    ///
    /// Calling `init` on an initialized filter does nothing.
    ///
    /// # Errors
    /// Returns `InitError` if the store cannot be initialized. The caller can
    /// then run unfiltered or abort.
    pub fn init(&self) -> Result<(), InitError> {
        if self.is_initialized() {
            return Ok(());
        }

        self.registry.store().initialize()?;
        self.state.capacity_warned.store(false, Ordering::Relaxed);
        self.state.initialized.store(true, Ordering::Release);

        tracing::debug!(target: crate::LOG_TARGET, mode = %self.mode(), "log filter initialized");
        Ok(())
    }

    /// Stop filtering and release every record.
    ///
    /// Must not race with steady-state traffic: the store is cleared while
    /// other callers may still hold handles to it.
    pub fn teardown(&self) {
        if !self.state.initialized.swap(false, Ordering::AcqRel) {
            return;
        }

        let released = self.registry.len();
        self.registry.clear();
        self.state.capacity_warned.store(false, Ordering::Relaxed);

        tracing::debug!(target: crate::LOG_TARGET, released, "log filter torn down");
    }

    /// Whether [`init`](Self::init) has succeeded and no teardown followed.
    pub fn is_initialized(&self) -> bool {
        self.state.initialized.load(Ordering::Acquire)
    }

    /// Current operating mode.
    pub fn mode(&self) -> FilterMode {
        FilterMode::from(self.state.mode.load(Ordering::Acquire))
    }

    /// Switch the operating mode. Stored records are left untouched.
    pub fn set_mode(&self, mode: FilterMode) {
        self.state.mode.store(mode as u8, Ordering::Release);
    }

    /// Decide whether to write or drop the log identified by `key`.
    ///
    /// Empty keys and calls outside init/teardown are allowed without touching
    /// the store.
    pub fn decide(&self, key: &[u8]) -> Verdict {
        if key.is_empty() || !self.is_initialized() {
            self.metrics.record_allowed();
            return Verdict::Allow;
        }

        match self.mode() {
            FilterMode::Plain => self.guarded(|| self.bursts.check(key)),
            FilterMode::Filtering => self.guarded(|| self.duplicates.check(key)),
        }
    }

    /// Shorthand for `decide(key).is_suppress()`.
    pub fn should_suppress(&self, key: &[u8]) -> bool {
        self.decide(key).is_suppress()
    }

    /// Run the duplicate rule directly, whatever the mode.
    ///
    /// Both raw entry points mutate the same window counters. When driving
    /// both for one key, call this one first; the other order gives
    /// different answers.
    pub fn check_duplicate(&self, key: &[u8]) -> Verdict {
        if key.is_empty() || !self.is_initialized() {
            self.metrics.record_allowed();
            return Verdict::Allow;
        }
        self.guarded(|| self.duplicates.check(key))
    }

    /// Run the burst rule directly, whatever the mode.
    pub fn check_burst(&self, key: &[u8]) -> Verdict {
        if key.is_empty() || !self.is_initialized() {
            self.metrics.record_allowed();
            return Verdict::Allow;
        }
        self.guarded(|| self.bursts.check(key))
    }

    /// Run one policy check, failing open on store errors and panics.
    fn guarded<F>(&self, check: F) -> Verdict
    where
        F: FnOnce() -> Result<PolicyDecision, StoreError>,
    {
        match panic::catch_unwind(panic::AssertUnwindSafe(check)) {
            Ok(Ok(decision)) => {
                self.metrics.record_decision(decision);
                Verdict::from(decision)
            }
            Ok(Err(error)) => {
                self.metrics.record_failure();
                self.metrics.record_allowed();
                self.warn_store_failure(&error);
                Verdict::Allow
            }
            Err(_) => {
                self.metrics.record_failure();
                self.metrics.record_allowed();
                Verdict::Allow
            }
        }
    }

    /// Log the first store failure of this store epoch.
    ///
    /// The latch is only set once the warning can reach a subscriber. Inside
    /// the dispatch of another event under a scoped default, `tracing` hands
    /// out the no-op dispatcher and the warning would be lost.
    fn warn_store_failure(&self, error: &StoreError) {
        let deliverable = dispatcher::get_default(|current| !current.is::<NoSubscriber>());
        if !deliverable || self.state.capacity_warned.swap(true, Ordering::Relaxed) {
            return;
        }
        tracing::warn!(
            target: crate::LOG_TARGET,
            %error,
            "log filter store failure, new keys pass unfiltered"
        );
    }

    /// Get the thresholds both rules use.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Get the shared registry.
    pub fn registry(&self) -> &RecordRegistry<S> {
        &self.registry
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Number of keys currently tracked.
    pub fn key_count(&self) -> usize {
        self.registry.len()
    }
}

impl<S> fmt::Debug for LogFilter<S>
where
    S: KeyStore + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogFilter")
            .field("mode", &self.mode())
            .field("initialized", &self.is_initialized())
            .field("thresholds", &self.thresholds)
            .field("keys", &self.registry.len())
            .finish()
    }
}
