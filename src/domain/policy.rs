//! Suppression policies for duplicate and massive logs.
//!
//! Two rules share the same per-key [`Record`]:
//!
//! - [`DuplicatePolicy`]: the first occurrence of a key passes, repeats are
//!   suppressed until the epoch (one hour by default) runs out.
//! - [`BurstPolicy`]: a key seen `massive_threshold` times within one rolling
//!   window is flagged as massive and suppressed for the rest of the epoch.
//!
//! In both rules the observation that crosses the burst threshold passes, so
//! exactly one notice is emitted when a log turns massive.
//!
//! The rules advance the shared window counters with slightly different logic.
//! Running both against the same key in a different order changes the outcome.

use crate::domain::record::{Record, WindowAdvance};
use std::fmt;
use std::time::{Duration, Instant};

/// Default rolling window for burst detection.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default number of occurrences within one window that marks a massive log.
pub const DEFAULT_MASSIVE_THRESHOLD: u64 = 60;

/// Default epoch after which all per-key state starts over.
pub const DEFAULT_EPOCH: Duration = Duration::from_secs(3600);

/// Error returned when threshold validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    /// Rolling window must be greater than zero
    ZeroWindow,
    /// Massive threshold must be greater than zero
    ZeroMassiveThreshold,
    /// Epoch must be greater than zero
    ZeroEpoch,
    /// Rolling window must not be longer than the epoch
    WindowExceedsEpoch {
        /// Configured window
        window: Duration,
        /// Configured epoch
        epoch: Duration,
    },
}

impl fmt::Display for ThresholdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdError::ZeroWindow => write!(f, "window must be greater than 0"),
            ThresholdError::ZeroMassiveThreshold => {
                write!(f, "massive threshold must be greater than 0")
            }
            ThresholdError::ZeroEpoch => write!(f, "epoch must be greater than 0"),
            ThresholdError::WindowExceedsEpoch { window, epoch } => write!(
                f,
                "window ({:?}) must not be longer than epoch ({:?})",
                window, epoch
            ),
        }
    }
}

impl std::error::Error for ThresholdError {}

/// Time windows and counts used by both suppression rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    window: Duration,
    massive_threshold: u64,
    epoch: Duration,
}

impl Thresholds {
    /// Create validated thresholds.
    ///
    /// # Errors
    /// Returns `ThresholdError` if any value is zero or the window is longer
    /// than the epoch.
    pub fn new(
        window: Duration,
        massive_threshold: u64,
        epoch: Duration,
    ) -> Result<Self, ThresholdError> {
        if window.is_zero() {
            return Err(ThresholdError::ZeroWindow);
        }
        if massive_threshold == 0 {
            return Err(ThresholdError::ZeroMassiveThreshold);
        }
        if epoch.is_zero() {
            return Err(ThresholdError::ZeroEpoch);
        }
        if window > epoch {
            return Err(ThresholdError::WindowExceedsEpoch { window, epoch });
        }
        Ok(Self {
            window,
            massive_threshold,
            epoch,
        })
    }

    /// Rolling window for burst detection.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Occurrences within one window that mark a massive log.
    pub fn massive_threshold(&self) -> u64 {
        self.massive_threshold
    }

    /// Epoch after which per-key state starts over.
    pub fn epoch(&self) -> Duration {
        self.epoch
    }
}

impl Default for Thresholds {
    /// 60 occurrences in 60 seconds, one-hour epoch.
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            massive_threshold: DEFAULT_MASSIVE_THRESHOLD,
            epoch: DEFAULT_EPOCH,
        }
    }
}

/// Why an observation was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// First occurrence of the key
    FirstSeen,
    /// Key crossed the burst threshold; this is the single transition notice
    MassiveDetected,
    /// Epoch ran out and the record started over
    EpochReset,
    /// Nothing to suppress
    Pass,
}

/// Why an observation was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Repeat of a key already seen in this epoch
    Duplicate,
    /// Key is flagged as a massive log
    Massive,
}

/// Decision made by a suppression policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Emit the log
    Allow(AllowReason),
    /// Drop the log
    Suppress(SuppressReason),
}

impl PolicyDecision {
    /// Check if this decision is Allow.
    pub fn is_allow(&self) -> bool {
        matches!(self, PolicyDecision::Allow(_))
    }

    /// Check if this decision is Suppress.
    pub fn is_suppress(&self) -> bool {
        matches!(self, PolicyDecision::Suppress(_))
    }
}

/// A rule that registers one observation on a record and decides its fate.
pub trait SuppressionPolicy: Send + Sync + fmt::Debug {
    /// Register an observation at `now` and decide whether to emit it.
    ///
    /// Always mutates the record, including when the answer is Allow.
    fn evaluate(&self, record: &mut Record, now: Instant) -> PolicyDecision;
}

/// Duplicate rule: allow the first occurrence, suppress repeats in the epoch.
///
/// Burst detection is folded in: a key that reaches the massive threshold
/// gets one more allowed observation as the transition notice.
///
/// # Example
/// ```
/// use tracing_dedup::{DuplicatePolicy, Record, SuppressionPolicy, Thresholds};
/// use std::time::{Duration, Instant};
///
/// let policy = DuplicatePolicy::new(Thresholds::default());
/// let now = Instant::now();
/// let mut record = Record::new(now);
///
/// assert!(policy.evaluate(&mut record, now).is_allow());
/// assert!(policy.evaluate(&mut record, now).is_suppress());
///
/// // One hour later the record starts over
/// let later = now + Duration::from_secs(3600);
/// assert!(policy.evaluate(&mut record, later).is_allow());
/// assert_eq!(record.total_count(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicatePolicy {
    thresholds: Thresholds,
}

impl DuplicatePolicy {
    /// Create a duplicate policy.
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds used by this policy.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

impl SuppressionPolicy for DuplicatePolicy {
    fn evaluate(&self, record: &mut Record, now: Instant) -> PolicyDecision {
        record.observe(now);
        record.advance_window(now, self.thresholds.window);

        if record.total_count() == 1 {
            return PolicyDecision::Allow(AllowReason::FirstSeen);
        }

        if record.epoch_elapsed(now) < self.thresholds.epoch {
            if record.try_mark_massive(self.thresholds.massive_threshold) {
                return PolicyDecision::Allow(AllowReason::MassiveDetected);
            }
            if record.is_massive() {
                return PolicyDecision::Suppress(SuppressReason::Massive);
            }
            PolicyDecision::Suppress(SuppressReason::Duplicate)
        } else {
            record.reset_epoch(now);
            PolicyDecision::Allow(AllowReason::EpochReset)
        }
    }
}

/// Burst rule: only massive logs are suppressed.
///
/// Repeats below the threshold always pass, so this is the rule for callers
/// that want runaway logs throttled without dropping ordinary duplicates.
///
/// # Example
/// ```
/// use tracing_dedup::{BurstPolicy, Record, SuppressionPolicy, Thresholds};
/// use std::time::{Duration, Instant};
///
/// let thresholds = Thresholds::new(Duration::from_secs(60), 3, Duration::from_secs(3600)).unwrap();
/// let policy = BurstPolicy::new(thresholds);
/// let now = Instant::now();
/// let mut record = Record::new(now);
///
/// assert!(policy.evaluate(&mut record, now).is_allow());
/// assert!(policy.evaluate(&mut record, now).is_allow());
/// // Third occurrence in the window: transition notice
/// assert!(policy.evaluate(&mut record, now).is_allow());
/// assert!(record.is_massive());
/// assert!(policy.evaluate(&mut record, now).is_suppress());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BurstPolicy {
    thresholds: Thresholds,
}

impl BurstPolicy {
    /// Create a burst policy.
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds used by this policy.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

impl SuppressionPolicy for BurstPolicy {
    fn evaluate(&self, record: &mut Record, now: Instant) -> PolicyDecision {
        record.observe(now);

        // A restarted window never crosses the threshold on its own
        if record.advance_window(now, self.thresholds.window) == WindowAdvance::Counted
            && record.try_mark_massive(self.thresholds.massive_threshold)
        {
            return PolicyDecision::Allow(AllowReason::MassiveDetected);
        }

        if record.is_massive() {
            if record.epoch_elapsed(now) >= self.thresholds.epoch {
                record.reset_epoch(now);
                return PolicyDecision::Allow(AllowReason::EpochReset);
            }
            return PolicyDecision::Suppress(SuppressReason::Massive);
        }

        PolicyDecision::Allow(AllowReason::Pass)
    }
}
