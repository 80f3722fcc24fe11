//! # tracing-dedup
//!
//! Duplicate and massive-log suppression for the `tracing` ecosystem.
//!
//! Every log event is reduced to a byte key, `LEVEL:message\n`, and checked
//! against two rules:
//!
//! - **Duplicates**: once a key has been written, further occurrences are
//!   dropped for the rest of a one-hour epoch.
//! - **Massive logs**: a key seen 60 times within a rolling 60-second window
//!   is flagged as massive. The event that crosses the threshold is written as
//!   a single notice, every later occurrence is dropped until the epoch ends.
//!
//! Which rule runs depends on the [`FilterMode`]: `Plain` only suppresses
//! massive logs, `Filtering` suppresses duplicates (and, through the same
//! counters, massive logs). The mode can be switched at any time without
//! losing state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tracing_dedup::{DedupLayer, FilterMode};
//! use tracing_subscriber::prelude::*;
//!
//! let dedup = DedupLayer::builder()
//!     .with_mode(FilterMode::Filtering)
//!     .build()
//!     .unwrap();
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer().with_filter(dedup))
//!     .init();
//!
//! for _ in 0..10 {
//!     tracing::warn!("disk almost full"); // written once
//! }
//! ```
//!
//! Or let [`LoggingConfig`] build the whole subscriber, with a runtime level
//! switch, console colors and an optional log file:
//!
//! ```rust,no_run
//! use tracing_dedup::{FilterMode, LoggingConfig};
//!
//! let logging = LoggingConfig::new()
//!     .with_file("service.log")
//!     .init()
//!     .unwrap();
//!
//! logging.set_mode(FilterMode::Filtering);
//! logging.set_level(tracing::Level::DEBUG).unwrap();
//! ```
//!
//! ## Without `tracing`
//!
//! [`LogFilter`] works on raw keys and can sit in front of any output:
//!
//! ```rust
//! use tracing_dedup::{FilterKey, FilterMode, LogFilter, RecordRegistry, ShardedKeyStore, SystemClock, Thresholds};
//! use std::sync::Arc;
//!
//! let registry = RecordRegistry::new(Arc::new(ShardedKeyStore::new()), Arc::new(SystemClock::new()));
//! let filter = LogFilter::new(registry, Thresholds::default(), FilterMode::Filtering);
//! filter.init().unwrap();
//!
//! let key = FilterKey::compose("ERROR", "upstream timeout");
//! assert!(!filter.should_suppress(key.as_bytes()));
//! assert!(filter.should_suppress(key.as_bytes()));
//! ```
//!
//! ## Failure Behavior
//!
//! The filter fails open. Empty keys, calls before `init()` or after
//! `teardown()`, a full key store and panics inside a decision all result in
//! the event being written. Such failures are counted in
//! [`Metrics::store_failures`].
//!
//! The first store failure is reported with a single `WARN` event on the
//! `tracing_dedup` target. A warning raised while another event is being
//! dispatched under a scoped subscriber (`with_default`) is dropped by
//! `tracing` itself, so in that setup the report waits for the first failure
//! seen outside event dispatch. Under a global subscriber it is written
//! immediately.
//!
//! ## Memory
//!
//! One record is kept per distinct key until teardown. For applications that
//! log many distinct messages, bound the store with
//! [`DedupLayerBuilder::with_max_keys`] (new keys then pass unfiltered) or,
//! with the `async` feature, enable the idle sweep with
//! `DedupLayerBuilder::with_idle_sweep`.
//!
//! ## Features
//!
//! - `async` (default): idle sweep on a tokio interval
//! - `test-helpers`: `MockClock`, `MockCaptureLayer` and `MockUnavailableStore`
//!   for downstream tests

/// Target of the crate's own diagnostics. `DedupLayer` never filters it, so
/// these events neither occupy keys nor count as store failures.
pub(crate) const LOG_TARGET: &str = "tracing_dedup";

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    key::FilterKey,
    mode::FilterMode,
    policy::{
        AllowReason, BurstPolicy, DuplicatePolicy, PolicyDecision, SuppressReason,
        SuppressionPolicy, ThresholdError, Thresholds,
    },
    record::Record,
};

pub use application::{
    filter::{InitError, LogFilter, Verdict},
    metrics::{Metrics, MetricsSnapshot},
    ports::{Clock, KeyStore, StoreError},
    registry::RecordRegistry,
    suppressor::{BurstSuppressor, DuplicateSuppressor, Suppressor},
};

#[cfg(feature = "async")]
pub use application::sweeper::{
    IdleSweeper, ShutdownError, SweepConfig, SweepConfigError, SweeperHandle,
};

pub use infrastructure::{
    clock::SystemClock,
    layer::{BuildError, DedupLayer, DedupLayerBuilder},
    logging::{LoggingConfig, LoggingError, LoggingHandle},
    storage::ShardedKeyStore,
};
