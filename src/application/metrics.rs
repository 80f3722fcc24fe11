//! Observability metrics for log filtering.
//!
//! Counts what the filter decided and why, for monitoring and debugging.

use crate::domain::policy::{AllowReason, PolicyDecision, SuppressReason};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking filter decisions.
///
/// All counters are atomics and clones share the same values.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    events_allowed: AtomicU64,
    events_suppressed: AtomicU64,
    duplicates_suppressed: AtomicU64,
    bursts_suppressed: AtomicU64,
    massive_transitions: AtomicU64,
    epoch_resets: AtomicU64,
    /// Decisions that failed open (store full, panic in a policy)
    store_failures: AtomicU64,
    records_swept: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    /// Record a policy decision, including its reason.
    pub(crate) fn record_decision(&self, decision: PolicyDecision) {
        match decision {
            PolicyDecision::Allow(reason) => {
                self.record_allowed();
                match reason {
                    AllowReason::MassiveDetected => {
                        self.inner
                            .massive_transitions
                            .fetch_add(1, Ordering::Relaxed);
                    }
                    AllowReason::EpochReset => {
                        self.inner.epoch_resets.fetch_add(1, Ordering::Relaxed);
                    }
                    AllowReason::FirstSeen | AllowReason::Pass => {}
                }
            }
            PolicyDecision::Suppress(reason) => {
                self.inner.events_suppressed.fetch_add(1, Ordering::Relaxed);
                let counter = match reason {
                    SuppressReason::Duplicate => &self.inner.duplicates_suppressed,
                    SuppressReason::Massive => &self.inner.bursts_suppressed,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record an event allowed without consulting a policy.
    pub(crate) fn record_allowed(&self) {
        self.inner.events_allowed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decision that failed open.
    pub(crate) fn record_failure(&self) {
        self.inner.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record records removed by the idle sweep.
    #[cfg_attr(not(feature = "async"), allow(dead_code))]
    pub(crate) fn record_swept(&self, count: u64) {
        self.inner.records_swept.fetch_add(count, Ordering::Relaxed);
    }

    /// Total number of events allowed.
    pub fn events_allowed(&self) -> u64 {
        self.inner.events_allowed.load(Ordering::Relaxed)
    }

    /// Total number of events suppressed.
    pub fn events_suppressed(&self) -> u64 {
        self.inner.events_suppressed.load(Ordering::Relaxed)
    }

    /// Events suppressed as ordinary duplicates.
    pub fn duplicates_suppressed(&self) -> u64 {
        self.inner.duplicates_suppressed.load(Ordering::Relaxed)
    }

    /// Events suppressed because their key is massive.
    pub fn bursts_suppressed(&self) -> u64 {
        self.inner.bursts_suppressed.load(Ordering::Relaxed)
    }

    /// Number of times a key turned massive.
    pub fn massive_transitions(&self) -> u64 {
        self.inner.massive_transitions.load(Ordering::Relaxed)
    }

    /// Number of records that started a fresh epoch.
    pub fn epoch_resets(&self) -> u64 {
        self.inner.epoch_resets.load(Ordering::Relaxed)
    }

    /// Number of decisions that failed open.
    pub fn store_failures(&self) -> u64 {
        self.inner.store_failures.load(Ordering::Relaxed)
    }

    /// Number of records removed by the idle sweep.
    pub fn records_swept(&self) -> u64 {
        self.inner.records_swept.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_allowed: self.events_allowed(),
            events_suppressed: self.events_suppressed(),
            duplicates_suppressed: self.duplicates_suppressed(),
            bursts_suppressed: self.bursts_suppressed(),
            massive_transitions: self.massive_transitions(),
            epoch_resets: self.epoch_resets(),
            store_failures: self.store_failures(),
            records_swept: self.records_swept(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.events_allowed,
            &inner.events_suppressed,
            &inner.duplicates_suppressed,
            &inner.bursts_suppressed,
            &inner.massive_transitions,
            &inner.epoch_resets,
            &inner.store_failures,
            &inner.records_swept,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Total number of events allowed
    pub events_allowed: u64,
    /// Total number of events suppressed
    pub events_suppressed: u64,
    /// Events suppressed as ordinary duplicates
    pub duplicates_suppressed: u64,
    /// Events suppressed because their key is massive
    pub bursts_suppressed: u64,
    /// Number of times a key turned massive
    pub massive_transitions: u64,
    /// Number of records that started a fresh epoch
    pub epoch_resets: u64,
    /// Decisions that failed open
    pub store_failures: u64,
    /// Records removed by the idle sweep
    pub records_swept: u64,
}

impl MetricsSnapshot {
    /// Calculate the suppression rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no events have been processed.
    pub fn suppression_rate(&self) -> f64 {
        let total = self.total_events();
        if total == 0 {
            0.0
        } else {
            self.events_suppressed as f64 / total as f64
        }
    }

    /// Get the total number of events processed (allowed + suppressed).
    pub fn total_events(&self) -> u64 {
        self.events_allowed.saturating_add(self.events_suppressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initial_state() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_decisions_by_reason() {
        let metrics = Metrics::new();
        metrics.record_decision(PolicyDecision::Allow(AllowReason::FirstSeen));
        metrics.record_decision(PolicyDecision::Allow(AllowReason::MassiveDetected));
        metrics.record_decision(PolicyDecision::Allow(AllowReason::EpochReset));
        metrics.record_decision(PolicyDecision::Suppress(SuppressReason::Duplicate));
        metrics.record_decision(PolicyDecision::Suppress(SuppressReason::Massive));
        metrics.record_decision(PolicyDecision::Suppress(SuppressReason::Massive));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_allowed, 3);
        assert_eq!(snapshot.events_suppressed, 3);
        assert_eq!(snapshot.massive_transitions, 1);
        assert_eq!(snapshot.epoch_resets, 1);
        assert_eq!(snapshot.duplicates_suppressed, 1);
        assert_eq!(snapshot.bursts_suppressed, 2);
    }

    #[test]
    fn test_snapshot_suppression_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().suppression_rate(), 0.0);

        metrics.record_allowed();
        metrics.record_decision(PolicyDecision::Suppress(SuppressReason::Duplicate));
        assert!((metrics.snapshot().suppression_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(metrics.snapshot().total_events(), 2);
    }

    #[test]
    fn test_failures_and_sweeps() {
        let metrics = Metrics::new();
        metrics.record_failure();
        metrics.record_swept(4);

        assert_eq!(metrics.store_failures(), 1);
        assert_eq!(metrics.records_swept(), 4);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_allowed();
        metrics.record_decision(PolicyDecision::Suppress(SuppressReason::Massive));
        metrics.record_failure();

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_concurrent_updates() {
        use std::thread;

        let metrics = Metrics::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.record_allowed();
                    m.record_decision(PolicyDecision::Suppress(SuppressReason::Duplicate));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.events_allowed(), 1000);
        assert_eq!(metrics.duplicates_suppressed(), 1000);
    }
}
