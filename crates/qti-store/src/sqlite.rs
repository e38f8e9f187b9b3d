//! SQLite-based store implementation

use chrono::{DateTime, Utc};
use qti_types::ItemSessionSnapshot;
use qti_util::{CandidateId, ItemId};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, SessionRecord, Store, StoreError, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- One session per candidate and item
            CREATE TABLE IF NOT EXISTS sessions (
                candidate_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                state TEXT NOT NULL,
                snapshot_json TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (candidate_id, item_id)
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_sessions_state ON sessions(state);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| qti_util::now())
}

impl Store for SqliteStore {
    fn save_session(
        &self,
        candidate: &CandidateId,
        snapshot: &ItemSessionSnapshot,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(snapshot)?;

        conn.execute(
            r#"
            INSERT INTO sessions (candidate_id, item_id, session_id, state, snapshot_json, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(candidate_id, item_id)
            DO UPDATE SET session_id = excluded.session_id,
                          state = excluded.state,
                          snapshot_json = excluded.snapshot_json,
                          updated_at = excluded.updated_at
            "#,
            params![
                candidate.as_str(),
                snapshot.item_id.as_str(),
                snapshot.session_id.to_string(),
                snapshot.state.as_str(),
                json,
                updated_at.to_rfc3339(),
            ],
        )?;

        debug!(
            candidate = %candidate,
            item = %snapshot.item_id,
            state = %snapshot.state,
            "Session saved"
        );
        Ok(())
    }

    fn load_session(
        &self,
        candidate: &CandidateId,
        item: &ItemId,
    ) -> StoreResult<Option<ItemSessionSnapshot>> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT snapshot_json FROM sessions WHERE candidate_id = ? AND item_id = ?",
                params![candidate.as_str(), item.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn delete_session(&self, candidate: &CandidateId, item: &ItemId) -> StoreResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE candidate_id = ? AND item_id = ?",
            params![candidate.as_str(), item.as_str()],
        )?;
        Ok(deleted > 0)
    }

    fn list_sessions(&self, candidate: Option<&CandidateId>) -> StoreResult<Vec<SessionRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT candidate_id, snapshot_json, updated_at FROM sessions
            WHERE ?1 IS NULL OR candidate_id = ?1
            ORDER BY candidate_id, item_id
            "#,
        )?;

        let rows = stmt.query_map([candidate.map(CandidateId::as_str)], |row| {
            let candidate_id: String = row.get(0)?;
            let snapshot_json: String = row.get(1)?;
            let updated_at: String = row.get(2)?;
            Ok((candidate_id, snapshot_json, updated_at))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (candidate_id, snapshot_json, updated_at) = row?;
            let snapshot: ItemSessionSnapshot = serde_json::from_str(&snapshot_json)?;
            records.push(SessionRecord {
                candidate_id: CandidateId::new(candidate_id),
                item_id: snapshot.item_id,
                session_id: snapshot.session_id,
                state: snapshot.state,
                updated_at: parse_rfc3339(&updated_at),
            });
        }

        Ok(records)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp: parse_rfc3339(&timestamp_str),
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
