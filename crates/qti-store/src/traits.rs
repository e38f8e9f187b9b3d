//! Store trait definitions

use chrono::{DateTime, Utc};
use qti_types::{ItemSessionSnapshot, ItemSessionState};
use qti_util::{CandidateId, ItemId, SessionId};

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Sessions

    /// Insert or replace the session of `candidate` on the snapshot's item
    fn save_session(
        &self,
        candidate: &CandidateId,
        snapshot: &ItemSessionSnapshot,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Load the stored session of `candidate` on `item`
    fn load_session(
        &self,
        candidate: &CandidateId,
        item: &ItemId,
    ) -> StoreResult<Option<ItemSessionSnapshot>>;

    /// Remove a stored session. Returns whether one existed.
    fn delete_session(&self, candidate: &CandidateId, item: &ItemId) -> StoreResult<bool>;

    /// List stored sessions, optionally restricted to one candidate
    fn list_sessions(&self, candidate: Option<&CandidateId>) -> StoreResult<Vec<SessionRecord>>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Summary row of a stored session
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionRecord {
    pub candidate_id: CandidateId,
    pub item_id: ItemId,
    pub session_id: SessionId,
    pub state: ItemSessionState,
    pub updated_at: DateTime<Utc>,
}
