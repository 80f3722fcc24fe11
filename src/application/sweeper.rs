//! Periodic removal of idle records.
//!
//! Records are otherwise only released on teardown, so a process that logs
//! many distinct messages grows its store without bound. The sweeper forgets
//! keys that have not been observed for `idle_after`.
//!
//! Sweeping is not transparent: a swept key starts a fresh epoch on its next
//! observation, while a kept record may still carry an older `first_seen`.
//! It is therefore opt-in.

use crate::application::metrics::Metrics;
use crate::application::ports::KeyStore;
use crate::application::registry::RecordRegistry;
use crate::domain::key::FilterKey;
use crate::domain::policy::DEFAULT_EPOCH;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Error returned when sweep configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepConfigError {
    /// Sweep interval must be greater than zero
    ZeroInterval,
    /// Idle threshold must be greater than zero
    ZeroIdleAfter,
}

impl std::fmt::Display for SweepConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepConfigError::ZeroInterval => write!(f, "sweep interval must be greater than 0"),
            SweepConfigError::ZeroIdleAfter => {
                write!(f, "idle threshold must be greater than 0")
            }
        }
    }
}

impl std::error::Error for SweepConfigError {}

/// Configuration for the idle sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// How often to sweep
    pub interval: Duration,
    /// Records unobserved for at least this long are removed
    pub idle_after: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            idle_after: DEFAULT_EPOCH,
        }
    }
}

impl SweepConfig {
    /// Create a sweep config with the specified interval.
    ///
    /// # Errors
    /// Returns `SweepConfigError::ZeroInterval` if `interval` is zero.
    pub fn new(interval: Duration) -> Result<Self, SweepConfigError> {
        if interval.is_zero() {
            return Err(SweepConfigError::ZeroInterval);
        }
        Ok(Self {
            interval,
            idle_after: DEFAULT_EPOCH,
        })
    }

    /// Set how long a record must stay unobserved before it is swept.
    ///
    /// # Errors
    /// Returns `SweepConfigError::ZeroIdleAfter` if `idle_after` is zero.
    pub fn with_idle_after(mut self, idle_after: Duration) -> Result<Self, SweepConfigError> {
        if idle_after.is_zero() {
            return Err(SweepConfigError::ZeroIdleAfter);
        }
        self.idle_after = idle_after;
        Ok(self)
    }
}

/// Error returned when the sweeper task does not stop cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// The sweeper task panicked
    TaskPanicked,
    /// The sweeper task was cancelled before it could stop
    TaskCancelled,
}

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::TaskPanicked => write!(f, "sweeper task panicked"),
            ShutdownError::TaskCancelled => write!(f, "sweeper task was cancelled"),
        }
    }
}

impl std::error::Error for ShutdownError {}

/// Removes records that have gone idle.
pub struct IdleSweeper<S>
where
    S: KeyStore + Clone,
{
    registry: RecordRegistry<S>,
    config: SweepConfig,
    metrics: Metrics,
}

impl<S> IdleSweeper<S>
where
    S: KeyStore + Clone,
{
    /// Create a sweeper over a registry.
    ///
    /// Removed records are counted in `metrics`.
    pub fn new(registry: RecordRegistry<S>, config: SweepConfig, metrics: Metrics) -> Self {
        Self {
            registry,
            config,
            metrics,
        }
    }

    /// Keys that the next sweep would remove, without removing them.
    pub fn collect_idle(&self) -> Vec<FilterKey> {
        let now = self.registry.now();
        let idle_after = self.config.idle_after;
        let mut idle = Vec::new();

        self.registry.for_each(|key, record| {
            if record.is_idle(now, idle_after) {
                idle.push(key.clone());
            }
        });

        idle
    }

    /// Remove idle records now and return how many were removed.
    pub fn sweep_now(&self) -> usize {
        let now = self.registry.now();
        let idle_after = self.config.idle_after;
        let mut removed = 0usize;

        self.registry.cleanup(|_key, record| {
            let idle = record.is_idle(now, idle_after);
            if idle {
                removed += 1;
            }
            !idle
        });

        if removed > 0 {
            self.metrics.record_swept(removed as u64);
            tracing::debug!(
                target: crate::LOG_TARGET,
                removed,
                remaining = self.registry.len(),
                "swept idle log records"
            );
        }
        removed
    }

    /// Start sweeping periodically.
    ///
    /// Spawns a background task on the current tokio runtime. The first sweep
    /// runs one interval after start.
    pub fn start(self) -> SweeperHandle
    where
        S: Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_now();
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        SweeperHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    /// Get the sweep configuration.
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Get a reference to the registry.
    pub fn registry(&self) -> &RecordRegistry<S> {
        &self.registry
    }
}

/// Handle to a running sweeper task.
///
/// Dropping the handle also stops the task, without waiting for it.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for its task to finish.
    ///
    /// # Errors
    /// Returns `ShutdownError` if the task panicked or was cancelled.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The task may already be gone; the join below reports why
            let _ = tx.send(());
        }

        self.task.await.map_err(|e| {
            if e.is_panic() {
                ShutdownError::TaskPanicked
            } else {
                ShutdownError::TaskCancelled
            }
        })
    }

    /// Whether the sweeper task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
