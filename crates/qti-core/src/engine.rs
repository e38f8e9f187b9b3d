//! Session engine: catalog, store and clock orchestration

use qti_config::{Catalog, ItemDefinition};
use qti_store::{AuditEvent, AuditEventType, SessionRecord, Store};
use qti_util::{CandidateId, Clock, ItemId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    EngineError, EngineResult, ItemSession, RecordedEvent, SessionError, SessionEvent,
    processor_for,
};

/// Drives persisted item sessions for candidates, one operation at a time
pub struct SessionEngine {
    catalog: Catalog,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl SessionEngine {
    pub fn new(catalog: Catalog, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        debug!(item_count = catalog.items.len(), "Session engine initialized");

        Self {
            catalog,
            store,
            clock,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn item(&self, item_id: &ItemId) -> EngineResult<&ItemDefinition> {
        self.catalog
            .get_item(item_id)
            .ok_or_else(|| EngineError::UnknownItem(item_id.clone()))
    }

    /// Restore the stored session of `candidate` on `item_id`, or create a new one
    pub fn open(&self, candidate: &CandidateId, item_id: &ItemId) -> EngineResult<ItemSession> {
        Ok(self.load(candidate, item_id)?.0)
    }

    /// The session plus whether it came from the store
    fn load(
        &self,
        candidate: &CandidateId,
        item_id: &ItemId,
    ) -> EngineResult<(ItemSession, bool)> {
        let item = self.item(item_id)?;
        let processor = processor_for(item);
        let latency = self.catalog.session.acceptable_latency;

        let (session, stored) = match self.store.load_session(candidate, item_id)? {
            Some(snapshot) => (
                ItemSession::restore(item.clone(), &snapshot, self.clock.clone(), processor)?,
                true,
            ),
            None => {
                debug!(candidate = %candidate, item_id = %item_id, "Creating item session");
                (ItemSession::new(item.clone(), self.clock.clone(), processor), false)
            }
        };

        Ok((session.with_acceptable_latency(latency), stored))
    }

    /// Persist the session and flush its events to the audit log
    fn save(&self, candidate: &CandidateId, session: &mut ItemSession) -> EngineResult<()> {
        let snapshot = session.snapshot();
        self.store
            .save_session(candidate, &snapshot, self.clock.now())?;

        for recorded in session.drain_events() {
            let event = audit_event(candidate, session, recorded);
            self.store.append_audit(event)?;
        }
        Ok(())
    }

    /// Open a session, run `op` on it and save it whatever the outcome.
    ///
    /// Failed transitions such as duration underflow still change the
    /// session, so it is saved before the error is returned.
    pub fn with_session<T>(
        &self,
        candidate: &CandidateId,
        item_id: &ItemId,
        op: impl FnOnce(&mut ItemSession) -> Result<T, SessionError>,
    ) -> EngineResult<T> {
        let mut session = self.open(candidate, item_id)?;
        let result = op(&mut session);
        self.save(candidate, &mut session)?;
        Ok(result?)
    }

    /// Read a session without creating it in the store.
    ///
    /// Reads may close a timed-out attempt, so a stored session is saved
    /// afterwards. A session that was never stored stays unsaved.
    pub fn inspect<T>(
        &self,
        candidate: &CandidateId,
        item_id: &ItemId,
        op: impl FnOnce(&mut ItemSession) -> T,
    ) -> EngineResult<T> {
        let (mut session, stored) = self.load(candidate, item_id)?;
        let result = op(&mut session);
        if stored {
            self.save(candidate, &mut session)?;
        }
        Ok(result)
    }

    /// Discard the stored session of `candidate` on `item_id`
    pub fn reset(&self, candidate: &CandidateId, item_id: &ItemId) -> EngineResult<bool> {
        let deleted = self.store.delete_session(candidate, item_id)?;
        if deleted {
            info!(candidate = %candidate, item_id = %item_id, "Stored session discarded");
            let _ = self.store.append_audit(AuditEvent::at(
                self.clock.now(),
                AuditEventType::SessionDeleted {
                    candidate_id: candidate.clone(),
                    item_id: item_id.clone(),
                },
            ));
        }
        Ok(deleted)
    }

    pub fn sessions(&self, candidate: Option<&CandidateId>) -> EngineResult<Vec<SessionRecord>> {
        Ok(self.store.list_sessions(candidate)?)
    }

    pub fn history(&self, limit: usize) -> EngineResult<Vec<AuditEvent>> {
        Ok(self.store.get_recent_audits(limit)?)
    }
}

fn audit_event(candidate: &CandidateId, session: &ItemSession, recorded: RecordedEvent) -> AuditEvent {
    let session_id = session.id();
    let item_id = session.item_id().clone();

    let event = match recorded.event {
        SessionEvent::SessionBegan => AuditEventType::SessionBegan {
            session_id,
            candidate_id: candidate.clone(),
            item_id,
        },
        SessionEvent::AttemptBegan { attempt } => AuditEventType::AttemptBegan {
            session_id,
            item_id,
            attempt,
        },
        SessionEvent::AttemptEnded {
            attempt,
            duration,
            state,
            late_submission,
        } => AuditEventType::AttemptEnded {
            session_id,
            item_id,
            attempt,
            duration,
            state,
            late_submission,
        },
        SessionEvent::AttemptRejected { kind, duration } => AuditEventType::AttemptRejected {
            session_id,
            item_id,
            reason: kind.to_string(),
            duration,
        },
        SessionEvent::TimeOverflowClosed { duration } => AuditEventType::TimeOverflowClosed {
            session_id,
            item_id,
            duration,
        },
        SessionEvent::SessionEnded {
            duration,
            num_attempts,
        } => AuditEventType::SessionEnded {
            session_id,
            item_id,
            duration,
            num_attempts,
        },
    };

    AuditEvent::at(recorded.at, event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResponseSet;
    use chrono::{TimeZone, Utc};
    use qti_config::ResponseProcessingTemplate;
    use qti_store::SqliteStore;
    use qti_types::{
        BaseType, Duration, ItemSessionState, SessionControl, TimeConstraint, Value,
        VariableDeclaration,
    };
    use qti_util::ManualClock;

    fn make_catalog() -> Catalog {
        let item = ItemDefinition::new("Q01")
            .with_time_limits(TimeConstraint::new(None, Some(Duration::from_secs(30))))
            .with_control(SessionControl::default().with_max_attempts(2))
            .with_variable(
                VariableDeclaration::response("RESPONSE", BaseType::Identifier)
                    .with_correct_response(Value::Identifier("ChoiceB".into())),
            )
            .with_variable(VariableDeclaration::outcome("SCORE", BaseType::Float))
            .with_response_processing(ResponseProcessingTemplate::MatchCorrect {
                response: "RESPONSE".into(),
                outcome: "SCORE".into(),
            });

        Catalog {
            session: Default::default(),
            items: vec![item],
        }
    }

    fn make_engine() -> (SessionEngine, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = SessionEngine::new(make_catalog(), store, Arc::new(clock.clone()));
        (engine, clock)
    }

    #[test]
    fn test_unknown_item() {
        let (engine, _) = make_engine();
        let result = engine.open(&CandidateId::new("alice"), &ItemId::new("Q99"));
        assert!(matches!(result, Err(EngineError::UnknownItem(_))));
    }

    #[test]
    fn test_session_persists_between_operations() {
        let (engine, clock) = make_engine();
        let alice = CandidateId::new("alice");
        let item = ItemId::new("Q01");

        engine.with_session(&alice, &item, |s| s.begin_session()).unwrap();
        engine.with_session(&alice, &item, |s| s.begin_attempt()).unwrap();
        clock.advance_secs(12);

        let result = engine
            .with_session(&alice, &item, |s| {
                s.end_attempt(ResponseSet::new().with("RESPONSE", Value::Identifier("ChoiceB".into())))
            })
            .unwrap();
        assert_eq!(result.state, ItemSessionState::Suspended);
        assert_eq!(result.duration, Duration::from_secs(12));

        let mut session = engine.open(&alice, &item).unwrap();
        assert_eq!(session.num_attempts(), 1);
        assert_eq!(session.value("SCORE").unwrap(), Some(Value::Float(1.0)));

        let records = engine.sessions(Some(&alice)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, ItemSessionState::Suspended);
    }

    #[test]
    fn test_failed_transition_is_saved() {
        let (engine, clock) = make_engine();
        let alice = CandidateId::new("alice");
        let item = ItemId::new("Q01");

        engine.with_session(&alice, &item, |s| s.begin_session()).unwrap();
        engine.with_session(&alice, &item, |s| s.begin_attempt()).unwrap();
        clock.advance_secs(45);

        let err = engine
            .with_session(&alice, &item, |s| s.end_attempt(ResponseSet::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Session(SessionError::DurationOverflow { .. })
        ));

        let mut session = engine.open(&alice, &item).unwrap();
        assert_eq!(session.state(), ItemSessionState::Closed);
        assert_eq!(session.duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_events_reach_audit_log() {
        let (engine, clock) = make_engine();
        let alice = CandidateId::new("alice");
        let item = ItemId::new("Q01");

        engine.with_session(&alice, &item, |s| s.begin_session()).unwrap();
        engine.with_session(&alice, &item, |s| s.begin_attempt()).unwrap();
        clock.advance_secs(5);
        engine
            .with_session(&alice, &item, |s| s.end_item_session())
            .unwrap();

        let history = engine.history(10).unwrap();
        assert_eq!(history.len(), 3);
        assert!(matches!(
            &history[0].event,
            AuditEventType::SessionEnded { duration, num_attempts: 1, .. }
                if *duration == Duration::from_secs(5)
        ));
        assert!(matches!(history[1].event, AuditEventType::AttemptBegan { attempt: 1, .. }));
        assert!(matches!(
            &history[2].event,
            AuditEventType::SessionBegan { candidate_id, .. } if candidate_id == &alice
        ));
    }

    #[test]
    fn test_new_engine_leaves_audit_log_empty() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));

        let _first = SessionEngine::new(make_catalog(), store.clone(), clock.clone());
        let second = SessionEngine::new(make_catalog(), store, clock);
        assert!(second.history(10).unwrap().is_empty());
    }

    #[test]
    fn test_inspect_does_not_store_new_sessions() {
        let (engine, _) = make_engine();
        let alice = CandidateId::new("alice");
        let item = ItemId::new("Q01");

        let state = engine.inspect(&alice, &item, |s| s.state()).unwrap();
        assert_eq!(state, ItemSessionState::Initial);
        assert!(engine.sessions(None).unwrap().is_empty());
    }

    #[test]
    fn test_inspect_saves_overflow_closure() {
        let (engine, clock) = make_engine();
        let alice = CandidateId::new("alice");
        let item = ItemId::new("Q01");

        engine.with_session(&alice, &item, |s| s.begin_session()).unwrap();
        engine.with_session(&alice, &item, |s| s.begin_attempt()).unwrap();
        clock.advance_secs(40);

        let state = engine.inspect(&alice, &item, |s| s.state()).unwrap();
        assert_eq!(state, ItemSessionState::Closed);

        let records = engine.sessions(Some(&alice)).unwrap();
        assert_eq!(records[0].state, ItemSessionState::Closed);
        assert!(matches!(
            engine.history(1).unwrap()[0].event,
            AuditEventType::TimeOverflowClosed { .. }
        ));
    }

    #[test]
    fn test_reset_discards_session() {
        let (engine, _) = make_engine();
        let alice = CandidateId::new("alice");
        let item = ItemId::new("Q01");

        engine.with_session(&alice, &item, |s| s.begin_session()).unwrap();
        assert!(engine.reset(&alice, &item).unwrap());
        assert!(!engine.reset(&alice, &item).unwrap());

        let mut session = engine.open(&alice, &item).unwrap();
        assert_eq!(session.state(), ItemSessionState::Initial);
    }
}
