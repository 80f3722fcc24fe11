//! Tracing integration layer.
//!
//! Provides a `tracing_subscriber::layer::Filter` that runs every event
//! through a [`LogFilter`].
//!
//! The filter key of an event is its level name and its rendered text, so
//! `info!("disk full")` and `warn!("disk full")` are tracked separately while
//! two `info!("disk full")` calls from different call sites share one record.

use crate::application::{
    filter::{InitError, LogFilter, Verdict},
    metrics::Metrics,
    ports::{Clock, KeyStore},
    registry::RecordRegistry,
};
use crate::domain::{
    key::FilterKey,
    mode::FilterMode,
    policy::{ThresholdError, Thresholds, DEFAULT_EPOCH, DEFAULT_MASSIVE_THRESHOLD, DEFAULT_WINDOW},
};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::storage::ShardedKeyStore;
use crate::infrastructure::visitor::MessageVisitor;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Filter};

#[cfg(feature = "async")]
use crate::application::sweeper::{
    IdleSweeper, ShutdownError, SweepConfig, SweepConfigError, SweeperHandle,
};

#[cfg(feature = "async")]
use std::sync::{Mutex, PoisonError};

/// Error returned when building a `DedupLayer` fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Window, massive threshold or epoch is invalid
    Thresholds(ThresholdError),
    /// Maximum keys must be greater than zero
    ZeroMaxKeys,
    /// Idle sweep configuration validation failed
    #[cfg(feature = "async")]
    SweepConfig(SweepConfigError),
    /// The filter could not be initialized
    Init(InitError),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Thresholds(e) => write!(f, "invalid thresholds: {}", e),
            BuildError::ZeroMaxKeys => write!(f, "max_keys must be greater than 0"),
            #[cfg(feature = "async")]
            BuildError::SweepConfig(e) => write!(f, "idle sweep configuration error: {}", e),
            BuildError::Init(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<ThresholdError> for BuildError {
    fn from(e: ThresholdError) -> Self {
        BuildError::Thresholds(e)
    }
}

#[cfg(feature = "async")]
impl From<SweepConfigError> for BuildError {
    fn from(e: SweepConfigError) -> Self {
        BuildError::SweepConfig(e)
    }
}

impl From<InitError> for BuildError {
    fn from(e: InitError) -> Self {
        BuildError::Init(e)
    }
}

/// Builder for constructing a `DedupLayer`.
pub struct DedupLayerBuilder {
    mode: FilterMode,
    window: Duration,
    massive_threshold: u64,
    epoch: Duration,
    clock: Option<Arc<dyn Clock>>,
    max_keys: Option<usize>,
    exempt_targets: BTreeSet<String>,
    #[cfg(feature = "async")]
    sweep_interval: Option<Duration>,
    #[cfg(feature = "async")]
    idle_after: Option<Duration>,
}

impl DedupLayerBuilder {
    /// Set the operating mode.
    ///
    /// Default: [`FilterMode::Plain`], only massive logs are suppressed.
    pub fn with_mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set window, massive threshold and epoch at once.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.window = thresholds.window();
        self.massive_threshold = thresholds.massive_threshold();
        self.epoch = thresholds.epoch();
        self
    }

    /// Set the rolling window used for burst detection.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set how many occurrences within one window make a key massive.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_massive_threshold(mut self, threshold: u64) -> Self {
        self.massive_threshold = threshold;
        self
    }

    /// Set the epoch after which a key's counters start over.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_epoch(mut self, epoch: Duration) -> Self {
        self.epoch = epoch;
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the maximum number of distinct keys to track.
    ///
    /// Once reached, events with new keys pass unfiltered while known keys
    /// keep being filtered. Default: unlimited.
    ///
    /// The first rejected key logs one `WARN` on the `tracing_dedup` target.
    /// Under a scoped subscriber (`with_default`) `tracing` drops events raised
    /// during another event's dispatch, so there the warning is logged by the
    /// first rejection seen outside dispatch, such as a direct
    /// [`DedupLayer::should_allow`] call. Every rejection is counted in
    /// [`Metrics::store_failures`] either way.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Remove the key limit.
    ///
    /// **Warning**: memory then grows with the number of distinct messages
    /// until teardown, unless an idle sweep is enabled.
    pub fn with_unlimited_keys(mut self) -> Self {
        self.max_keys = None;
        self
    }

    /// Never filter events from these targets.
    ///
    /// Duplicate targets are removed, and empty targets are filtered out.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use tracing_dedup::DedupLayer;
    /// let layer = DedupLayer::builder()
    ///     .with_exempt_targets(vec!["myapp::audit".to_string()])
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn with_exempt_targets(mut self, targets: Vec<String>) -> Self {
        self.exempt_targets = targets.into_iter().filter(|t| !t.is_empty()).collect();
        self
    }

    /// Periodically forget keys that have gone idle.
    ///
    /// A swept key is treated as new when it shows up again. Default: disabled.
    ///
    /// **Requires the `async` feature** and a running tokio runtime at `build()`.
    #[cfg(feature = "async")]
    pub fn with_idle_sweep(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Set how long a key must stay unobserved before the sweep removes it.
    ///
    /// Default: one epoch.
    #[cfg(feature = "async")]
    pub fn with_idle_after(mut self, idle_after: Duration) -> Self {
        self.idle_after = Some(idle_after);
        self
    }

    /// Build and initialize the layer.
    ///
    /// # Errors
    /// Returns `BuildError` if any setting is invalid or the filter cannot be
    /// initialized.
    pub fn build(self) -> Result<DedupLayer, BuildError> {
        let thresholds = Thresholds::new(self.window, self.massive_threshold, self.epoch)?;

        let store = match self.max_keys {
            Some(0) => return Err(BuildError::ZeroMaxKeys),
            Some(limit) => ShardedKeyStore::with_max_keys(limit),
            None => ShardedKeyStore::new(),
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let registry = RecordRegistry::new(Arc::new(store), clock);

        #[cfg(feature = "async")]
        let sweep_config = match self.sweep_interval {
            Some(interval) => {
                let config = SweepConfig::new(interval)?;
                Some(match self.idle_after {
                    Some(idle_after) => config.with_idle_after(idle_after)?,
                    None => config.with_idle_after(thresholds.epoch())?,
                })
            }
            None => None,
        };

        let filter = LogFilter::new(registry.clone(), thresholds, self.mode);
        filter.init()?;

        #[cfg(feature = "async")]
        let sweeper_handle = {
            let handle = sweep_config.map(|config| {
                IdleSweeper::new(registry, config, filter.metrics().clone()).start()
            });
            Arc::new(Mutex::new(handle))
        };

        Ok(DedupLayer {
            filter,
            exempt_targets: Arc::new(self.exempt_targets),
            #[cfg(feature = "async")]
            sweeper_handle,
        })
    }
}

/// A `Filter` that drops duplicate and massive log events.
///
/// Attach it to the output layers with `with_filter`. Clones share all
/// state, so one layer can filter several outputs consistently as long as
/// they sit behind a single `with_filter` call.
///
/// # Example
///
/// ```no_run
/// use tracing_dedup::{DedupLayer, FilterMode};
/// use tracing_subscriber::prelude::*;
///
/// let dedup = DedupLayer::builder()
///     .with_mode(FilterMode::Filtering)
///     .build()
///     .unwrap();
///
/// tracing_subscriber::registry()
///     .with(tracing_subscriber::fmt::layer().with_filter(dedup))
///     .init();
/// ```
#[derive(Clone)]
pub struct DedupLayer<S = Arc<ShardedKeyStore>>
where
    S: KeyStore + Clone,
{
    filter: LogFilter<S>,
    exempt_targets: Arc<BTreeSet<String>>,
    #[cfg(feature = "async")]
    sweeper_handle: Arc<Mutex<Option<SweeperHandle>>>,
}

impl<S> DedupLayer<S>
where
    S: KeyStore + Clone,
{
    /// Decide whether an event with this level and rendered text is written.
    pub fn should_allow(&self, level: &tracing::Level, line: &str) -> bool {
        let key = FilterKey::compose(level.as_str(), line);
        !self.filter.decide(key.as_bytes()).is_suppress()
    }

    /// Get a reference to the underlying filter.
    pub fn filter(&self) -> &LogFilter<S> {
        &self.filter
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        self.filter.metrics()
    }

    /// Get the current number of tracked keys.
    pub fn key_count(&self) -> usize {
        self.filter.key_count()
    }

    /// Current operating mode.
    pub fn mode(&self) -> FilterMode {
        self.filter.mode()
    }

    /// Switch the operating mode for this layer and all its clones.
    pub fn set_mode(&self, mode: FilterMode) {
        self.filter.set_mode(mode);
    }

    /// Stop the idle sweep, if running.
    ///
    /// **Requires the `async` feature.**
    ///
    /// # Errors
    ///
    /// Returns an error if the sweeper task fails to shut down gracefully.
    #[cfg(feature = "async")]
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        // Take the handle while holding the lock, then release the lock before awaiting
        let handle = self
            .sweeper_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            handle.shutdown().await?;
        }
        Ok(())
    }
}

impl DedupLayer<Arc<ShardedKeyStore>> {
    /// Create a builder for configuring the layer.
    ///
    /// Defaults:
    /// - Mode: plain (massive logs only)
    /// - Window: 60 seconds
    /// - Massive threshold: 60 occurrences per window
    /// - Epoch: 1 hour
    /// - Max keys: unlimited
    /// - Idle sweep: disabled
    pub fn builder() -> DedupLayerBuilder {
        DedupLayerBuilder {
            mode: FilterMode::default(),
            window: DEFAULT_WINDOW,
            massive_threshold: DEFAULT_MASSIVE_THRESHOLD,
            epoch: DEFAULT_EPOCH,
            clock: None,
            max_keys: None,
            exempt_targets: BTreeSet::new(),
            #[cfg(feature = "async")]
            sweep_interval: None,
            #[cfg(feature = "async")]
            idle_after: None,
        }
    }

    /// Create a layer with default settings.
    ///
    /// Equivalent to `DedupLayer::builder().build().unwrap()`.
    ///
    /// # Panics
    /// This method cannot panic because all default values are valid and the
    /// in-memory store always initializes.
    pub fn new() -> Self {
        Self::builder()
            .build()
            .expect("default configuration is always valid")
    }
}

impl<S> DedupLayer<S>
where
    S: KeyStore + Clone,
{
    /// Create a layer around an existing filter.
    ///
    /// This allows using a custom key store. The filter is initialized if it
    /// is not already; clones of it keep sharing state with the layer.
    ///
    /// # Errors
    /// Returns `BuildError::Init` if the store cannot be initialized.
    pub fn with_filter(filter: LogFilter<S>) -> Result<Self, BuildError> {
        filter.init()?;
        Ok(Self {
            filter,
            exempt_targets: Arc::new(BTreeSet::new()),
            #[cfg(feature = "async")]
            sweeper_handle: Arc::new(Mutex::new(None)),
        })
    }
}

impl Default for DedupLayer<Arc<ShardedKeyStore>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for DedupLayer<S>
where
    S: KeyStore + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupLayer")
            .field("filter", &self.filter)
            .field("exempt_targets", &self.exempt_targets)
            .finish()
    }
}

impl<S, Sub> Filter<Sub> for DedupLayer<S>
where
    S: KeyStore + Clone,
    Sub: Subscriber,
{
    fn enabled(&self, _meta: &Metadata<'_>, _cx: &Context<'_, Sub>) -> bool {
        // Every callsite stays enabled; the decision needs the event's values
        true
    }

    fn event_enabled(&self, event: &tracing::Event<'_>, _cx: &Context<'_, Sub>) -> bool {
        let metadata = event.metadata();

        // Our own diagnostics must not take keys from the store
        if metadata.target() == crate::LOG_TARGET {
            return true;
        }

        // Skip the lookup if no exempt targets are configured (common case)
        if !self.exempt_targets.is_empty() && self.exempt_targets.contains(metadata.target()) {
            self.filter.metrics().record_allowed();
            return true;
        }

        let mut visitor = MessageVisitor::new();
        event.record(&mut visitor);
        let key = FilterKey::compose(metadata.level().as_str(), &visitor.into_line());

        self.filter.decide(key.as_bytes()) == Verdict::Allow
    }
}
