//! Sliding-window message counter.

use std::collections::VecDeque;

use banterbot_config::ResponderConfig;
use chrono::{DateTime, TimeDelta, Utc};

/// Whole seconds as a `TimeDelta`, saturating at `TimeDelta::MAX`.
pub(crate) fn seconds_delta(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Arrival times of recent messages in one channel.
///
/// Entries are pruned lazily, right before each threshold evaluation, so the
/// count always reflects the window ending at the evaluation time.
#[derive(Debug, Clone)]
pub struct SlidingWindowTracker {
    window: TimeDelta,
    threshold: usize,
    timestamps: VecDeque<DateTime<Utc>>,
}

impl SlidingWindowTracker {
    pub fn new(window_secs: u64, threshold: usize) -> Self {
        Self {
            window: seconds_delta(window_secs),
            threshold,
            timestamps: VecDeque::new(),
        }
    }

    pub fn from_config(config: &ResponderConfig) -> Self {
        Self::new(config.window_secs, config.threshold_messages)
    }

    /// Append an arrival time.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.timestamps.push_back(now);
    }

    /// Drop every entry with `now - t >= window`. Returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.timestamps.len();
        let window = self.window;
        self.timestamps.retain(|t| now - *t < window);
        before - self.timestamps.len()
    }

    pub fn count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn threshold_met(&self) -> bool {
        self.count() >= self.threshold
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.timestamps.iter()
    }
}
