//! Audit event types

use chrono::{DateTime, Utc};
use qti_types::{Duration, ItemSessionState};
use qti_util::{CandidateId, ItemId, SessionId};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Session began for a candidate
    SessionBegan {
        session_id: SessionId,
        candidate_id: CandidateId,
        item_id: ItemId,
    },

    /// Attempt opened
    AttemptBegan {
        session_id: SessionId,
        item_id: ItemId,
        attempt: u32,
    },

    /// Attempt accepted and processed
    AttemptEnded {
        session_id: SessionId,
        item_id: ItemId,
        attempt: u32,
        duration: Duration,
        state: ItemSessionState,
        late_submission: bool,
    },

    /// Attempt end refused
    AttemptRejected {
        session_id: SessionId,
        item_id: ItemId,
        reason: String,
        duration: Duration,
    },

    /// Session closed because the time ran out
    TimeOverflowClosed {
        session_id: SessionId,
        item_id: ItemId,
        duration: Duration,
    },

    /// Session closed explicitly
    SessionEnded {
        session_id: SessionId,
        item_id: ItemId,
        duration: Duration,
        num_attempts: u32,
    },

    /// Stored session discarded
    SessionDeleted {
        candidate_id: CandidateId,
        item_id: ItemId,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self::at(qti_util::now(), event)
    }

    /// Event stamped with an explicit time (e.g. from a session clock)
    pub fn at(timestamp: DateTime<Utc>, event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp,
            event,
        }
    }
}
