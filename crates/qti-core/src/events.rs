//! Events recorded by item sessions

use chrono::{DateTime, Utc};
use qti_types::{Duration, ItemSessionState};
use serde::Serialize;

use crate::ErrorKind;

/// Lifecycle events of an item session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionBegan,

    AttemptBegan {
        attempt: u32,
    },

    /// Attempt accepted and processed
    AttemptEnded {
        attempt: u32,
        duration: Duration,
        state: ItemSessionState,
        late_submission: bool,
    },

    /// Attempt end refused; the attempt still counts
    AttemptRejected {
        kind: ErrorKind,
        duration: Duration,
    },

    /// Open attempt closed because the time ran out
    TimeOverflowClosed {
        duration: Duration,
    },

    /// Session closed explicitly
    SessionEnded {
        duration: Duration,
        num_attempts: u32,
    },
}

/// Event stamped with the session clock
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    pub at: DateTime<Utc>,
    pub event: SessionEvent,
}
