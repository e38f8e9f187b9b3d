//! Attempt and time policies applied to an item session

use serde::{Deserialize, Serialize};

use crate::Duration;

/// Minimum/maximum time allowed on an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeConstraint {
    #[serde(default)]
    pub min_time: Option<Duration>,
    #[serde(default)]
    pub max_time: Option<Duration>,
    #[serde(default)]
    pub allow_late_submission: bool,
}

impl TimeConstraint {
    pub fn new(min_time: Option<Duration>, max_time: Option<Duration>) -> Self {
        Self {
            min_time,
            max_time,
            allow_late_submission: false,
        }
    }

    pub fn with_late_submission(mut self, allow: bool) -> Self {
        self.allow_late_submission = allow;
        self
    }

    /// Longest duration tolerated before the time is considered up,
    /// i.e. `max_time + latency`. None when there is no maximum.
    pub fn overflow_threshold(&self, latency: Duration) -> Option<Duration> {
        self.max_time.map(|max| max + latency)
    }

    /// Whether `elapsed` has reached the maximum time (plus latency).
    pub fn is_overflowed(&self, elapsed: Duration, latency: Duration) -> bool {
        self.overflow_threshold(latency)
            .is_some_and(|threshold| elapsed.longer_than_or_equals(&threshold))
    }

    /// Whether an overflow at `elapsed` must be rejected rather than accepted late.
    pub fn rejects_overflow(&self, elapsed: Duration, latency: Duration) -> bool {
        !self.allow_late_submission && self.is_overflowed(elapsed, latency)
    }

    /// Whether `elapsed` is still short of the minimum time.
    pub fn is_underflowed(&self, elapsed: Duration) -> bool {
        self.min_time.is_some_and(|min| elapsed.shorter_than(&min))
    }

    /// Time left before `max_time`, floored at zero. None means unbounded.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.max_time.map(|max| max - elapsed)
    }
}

/// Maximum number of attempts; 0 means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptPolicy {
    pub max_attempts: u32,
}

impl AttemptPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn unlimited() -> Self {
        Self { max_attempts: 0 }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_attempts == 0
    }

    /// Attempts left after `num_attempts`, floored at zero. None means unbounded.
    pub fn remaining(&self, num_attempts: u32) -> Option<u32> {
        if self.is_unlimited() {
            None
        } else {
            Some(self.max_attempts.saturating_sub(num_attempts))
        }
    }
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Per-item session control parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionControl {
    #[serde(default)]
    pub attempts: AttemptPolicy,
    /// When false, an attempt cannot end with every response left unset
    #[serde(default = "default_allow_skipping")]
    pub allow_skipping: bool,
}

fn default_allow_skipping() -> bool {
    true
}

impl SessionControl {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.attempts = AttemptPolicy::new(max_attempts);
        self
    }

    pub fn with_allow_skipping(mut self, allow: bool) -> Self {
        self.allow_skipping = allow;
        self
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self {
            attempts: AttemptPolicy::default(),
            allow_skipping: true,
        }
    }
}
