//! Per-key observation record.
//!
//! A `Record` holds the counters and timestamps both suppression rules read
//! and write for one filter key. Records live inside a key store and are only
//! touched while the store holds that key's lock.

use std::time::{Duration, Instant};

/// Outcome of advancing the rolling window for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAdvance {
    /// The window had elapsed and was re-synchronized to this observation.
    Restarted,
    /// The observation was counted in the current window.
    Counted,
}

/// Counters and timestamps tracked for one filter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    first_seen: Instant,
    last_seen: Instant,
    total_count: u64,
    window_count: u64,
    window_start: Instant,
    is_massive: bool,
}

impl Record {
    /// Create an empty record at `now`.
    ///
    /// Counters start at zero; the first observation brings them to one.
    pub fn new(now: Instant) -> Self {
        Self {
            first_seen: now,
            last_seen: now,
            total_count: 0,
            window_count: 0,
            window_start: now,
            is_massive: false,
        }
    }

    /// Start of the current epoch.
    pub fn first_seen(&self) -> Instant {
        self.first_seen
    }

    /// Time of the most recent observation.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Occurrences since `first_seen`.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Occurrences in the current rolling window.
    pub fn window_count(&self) -> u64 {
        self.window_count
    }

    /// Start of the current rolling window.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Whether the key is currently flagged as a massive (burst) log.
    pub fn is_massive(&self) -> bool {
        self.is_massive
    }

    /// Time elapsed in the current epoch.
    pub fn epoch_elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.first_seen)
    }

    /// Whether the key has gone unobserved for at least `idle_after`.
    pub fn is_idle(&self, now: Instant, idle_after: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= idle_after
    }

    /// Count one occurrence and stamp `last_seen`.
    pub(crate) fn observe(&mut self, now: Instant) {
        self.total_count = self.total_count.saturating_add(1);
        self.last_seen = now;
    }

    /// Advance the rolling window for an observation at `now`.
    ///
    /// The window is left-closed: once `window` has elapsed since
    /// `window_start`, it restarts at `now` with a count of one.
    pub(crate) fn advance_window(&mut self, now: Instant, window: Duration) -> WindowAdvance {
        if now.saturating_duration_since(self.window_start) >= window {
            self.window_count = 1;
            self.window_start = now;
            WindowAdvance::Restarted
        } else {
            self.window_count = self.window_count.saturating_add(1);
            WindowAdvance::Counted
        }
    }

    /// Flag the key as massive if the window count has reached `threshold`.
    ///
    /// Returns `true` only on the transition, never when already flagged.
    pub(crate) fn try_mark_massive(&mut self, threshold: u64) -> bool {
        if self.window_count >= threshold && !self.is_massive {
            self.is_massive = true;
            true
        } else {
            false
        }
    }

    /// Start a fresh epoch where the current observation is occurrence #1.
    pub(crate) fn reset_epoch(&mut self, now: Instant) {
        self.first_seen = now;
        self.last_seen = now;
        self.total_count = 1;
        self.window_count = 1;
        self.window_start = now;
        self.is_massive = false;
    }
}
