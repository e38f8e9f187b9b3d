//! Item session state machine

use chrono::{DateTime, Utc};
use qti_config::ItemDefinition;
use qti_types::{
    AttemptPolicy, CompletionStatus, DURATION_VARIABLE, Duration, ItemSessionSnapshot,
    ItemSessionState, NUM_ATTEMPTS_VARIABLE, Value, VariableKind,
};
use qti_util::{Clock, ItemId, SessionId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    ErrorKind, RecordedEvent, ResponseProcessor, ResponseSet, SessionError, SessionEvent,
    VariableState,
};

/// Outcome of a successful `end_attempt`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptResult {
    /// State the session moved to
    pub state: ItemSessionState,
    /// Accumulated duration after the attempt
    pub duration: Duration,
    /// The attempt ran past the maximum time and was accepted late
    pub late_submission: bool,
}

/// One candidate's session on one item.
///
/// Every public read and transition first reconciles time: an open attempt
/// that has run out of time (late submission disallowed) is closed with its
/// duration frozen at `max_time + acceptable_latency` before anything else
/// happens.
pub struct ItemSession {
    id: SessionId,
    definition: ItemDefinition,
    acceptable_latency: Duration,
    clock: Arc<dyn Clock>,
    processor: Arc<dyn ResponseProcessor>,

    state: ItemSessionState,
    /// Frozen at the last transition; live time is added while interacting
    duration: Duration,
    num_attempts: u32,
    time_reference: DateTime<Utc>,
    /// Set by a forced time-overflow closure until `end_attempt` reports it
    overflow_pending: bool,
    variables: VariableState,

    events: Vec<RecordedEvent>,
}

impl std::fmt::Debug for ItemSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemSession")
            .field("id", &self.id)
            .field("item_id", &self.definition.id)
            .field("state", &self.state)
            .field("duration", &self.duration)
            .field("num_attempts", &self.num_attempts)
            .field("time_reference", &self.time_reference)
            .finish_non_exhaustive()
    }
}

impl ItemSession {
    /// Create a session in the `Initial` state
    pub fn new(
        definition: ItemDefinition,
        clock: Arc<dyn Clock>,
        processor: Arc<dyn ResponseProcessor>,
    ) -> Self {
        let time_reference = clock.now();
        let mut variables = VariableState::new(&definition.variables);
        variables.set_built_ins(Duration::ZERO, 0);

        Self {
            id: SessionId::new(),
            definition,
            acceptable_latency: Duration::ZERO,
            clock,
            processor,
            state: ItemSessionState::Initial,
            duration: Duration::ZERO,
            num_attempts: 0,
            time_reference,
            overflow_pending: false,
            variables,
            events: Vec::new(),
        }
    }

    /// Tolerance added to `max_time` before an attempt counts as overflowed
    pub fn with_acceptable_latency(mut self, latency: Duration) -> Self {
        self.acceptable_latency = latency;
        self
    }

    /// Rebuild a session from a snapshot taken of the same item
    pub fn restore(
        definition: ItemDefinition,
        snapshot: &ItemSessionSnapshot,
        clock: Arc<dyn Clock>,
        processor: Arc<dyn ResponseProcessor>,
    ) -> Result<Self, SessionError> {
        if snapshot.item_id != definition.id {
            return Err(SessionError::ItemMismatch {
                expected: definition.id.clone(),
                found: snapshot.item_id.clone(),
            });
        }

        let mut variables = VariableState::new(&definition.variables);
        variables.restore_values(&snapshot.variables)?;
        variables.set_built_ins(snapshot.duration, snapshot.num_attempts);

        debug!(
            session_id = %snapshot.session_id,
            item_id = %definition.id,
            state = %snapshot.state,
            "Item session restored"
        );

        Ok(Self {
            id: snapshot.session_id,
            definition,
            acceptable_latency: Duration::ZERO,
            clock,
            processor,
            state: snapshot.state,
            duration: snapshot.duration,
            num_attempts: snapshot.num_attempts,
            time_reference: snapshot.time_reference,
            overflow_pending: snapshot.overflow_pending,
            variables,
            events: Vec::new(),
        })
    }

    /// Complete, order-independent view of the session
    pub fn snapshot(&mut self) -> ItemSessionSnapshot {
        self.reconcile_time_overflow();
        ItemSessionSnapshot {
            session_id: self.id,
            item_id: self.definition.id.clone(),
            state: self.state,
            duration: self.duration,
            num_attempts: self.num_attempts,
            time_reference: self.time_reference,
            overflow_pending: self.overflow_pending,
            variables: self.variables.to_map(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn item_id(&self) -> &ItemId {
        &self.definition.id
    }

    pub fn num_attempts(&self) -> u32 {
        self.num_attempts
    }

    /// Take the events recorded since the last call
    pub fn drain_events(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.events)
    }

    // Reads

    pub fn state(&mut self) -> ItemSessionState {
        self.reconcile_time_overflow();
        self.state
    }

    /// Accumulated duration, including the open attempt
    pub fn duration(&mut self) -> Duration {
        let now = self.clock.now();
        self.reconcile_at(now);
        self.live_duration(now)
    }

    /// Time left before `max_time`, floored at zero. None when there is no maximum.
    pub fn remaining_time(&mut self) -> Option<Duration> {
        let now = self.clock.now();
        self.reconcile_at(now);
        self.definition.time_limits.remaining(self.live_duration(now))
    }

    /// Attempts left. None when unlimited; always `Some(0)` once closed.
    pub fn remaining_attempts(&mut self) -> Option<u32> {
        self.reconcile_time_overflow();
        if self.state == ItemSessionState::Closed {
            return Some(0);
        }
        self.attempt_policy().remaining(self.num_attempts)
    }

    pub fn is_attemptable(&mut self) -> bool {
        self.reconcile_time_overflow();
        self.not_attemptable_reason().is_none()
    }

    pub fn completion_status(&mut self) -> Option<CompletionStatus> {
        self.reconcile_time_overflow();
        self.variables.completion_status()
    }

    /// Current value of a variable (None is NULL)
    pub fn value(&mut self, identifier: &str) -> Result<Option<Value>, SessionError> {
        let now = self.clock.now();
        self.reconcile_at(now);

        if identifier == DURATION_VARIABLE {
            return Ok(Some(Value::Duration(self.live_duration(now))));
        }
        if !self.variables.contains(identifier) {
            return Err(SessionError::UnknownVariable(identifier.to_string()));
        }
        Ok(self.variables.get(identifier).cloned())
    }

    /// Copy of the variable state with the live `duration`
    pub fn variables(&mut self) -> VariableState {
        let now = self.clock.now();
        self.reconcile_at(now);
        let mut variables = self.variables.clone();
        variables.set_built_ins(self.live_duration(now), self.num_attempts);
        variables
    }

    /// Parse textual input for a declared variable
    pub fn parse_value(&self, identifier: &str, raw: &str) -> Result<Value, SessionError> {
        self.variables.parse_value(identifier, raw)
    }

    // Writes

    /// Set a variable. Response variables are writable only while interacting;
    /// nothing is writable once closed.
    pub fn set_variable(
        &mut self,
        identifier: &str,
        value: Option<Value>,
    ) -> Result<(), SessionError> {
        self.reconcile_time_overflow();

        if self.state == ItemSessionState::Closed {
            return Err(self.violation("set a variable"));
        }
        if identifier == DURATION_VARIABLE || identifier == NUM_ATTEMPTS_VARIABLE {
            return Err(SessionError::ReadOnlyVariable(identifier.to_string()));
        }

        let kind = self
            .variables
            .declaration(identifier)
            .map(|d| d.kind)
            .ok_or_else(|| SessionError::UnknownVariable(identifier.to_string()))?;
        if kind == VariableKind::Response && self.state != ItemSessionState::Interacting {
            return Err(self.violation("set a response"));
        }

        self.variables.assign(identifier, value)
    }

    // Transitions

    /// `Initial -> Suspended`
    pub fn begin_session(&mut self) -> Result<(), SessionError> {
        if self.state != ItemSessionState::Initial {
            return Err(self.violation("begin the session"));
        }

        let now = self.clock.now();
        self.time_reference = now;
        self.duration = Duration::ZERO;
        self.num_attempts = 0;
        self.overflow_pending = false;
        self.variables = VariableState::new(&self.definition.variables);
        self.variables.set_completion_status(CompletionStatus::NotAttempted);
        self.sync_built_ins();
        self.state = ItemSessionState::Suspended;

        info!(session_id = %self.id, item_id = %self.definition.id, "Item session began");
        self.record(now, SessionEvent::SessionBegan);
        Ok(())
    }

    /// `Suspended -> Interacting`, opening a new attempt
    pub fn begin_attempt(&mut self) -> Result<(), SessionError> {
        let now = self.clock.now();
        self.reconcile_at(now);

        if self.state != ItemSessionState::Suspended {
            return Err(self.violation("begin an attempt"));
        }
        if let Some(reason) = self.not_attemptable_reason() {
            debug!(item_id = %self.definition.id, reason, "Attempt refused");
            return Err(SessionError::NotAttemptable { reason });
        }

        self.num_attempts += 1;
        self.time_reference = now;
        if self.num_attempts == 1 {
            self.variables.reset(VariableKind::Response);
        }
        if !self.definition.adaptive {
            self.variables.reset(VariableKind::Outcome);
        }
        self.variables.set_completion_status(CompletionStatus::Unknown);
        self.sync_built_ins();
        self.state = ItemSessionState::Interacting;

        info!(
            session_id = %self.id,
            item_id = %self.definition.id,
            num_attempts = self.num_attempts,
            "Attempt began"
        );
        self.record(
            now,
            SessionEvent::AttemptBegan {
                attempt: self.num_attempts,
            },
        );
        Ok(())
    }

    /// Close the open attempt with the given responses.
    ///
    /// Time constraints are checked before processing. A rejected attempt
    /// still counts towards `num_attempts`.
    pub fn end_attempt(&mut self, responses: ResponseSet) -> Result<AttemptResult, SessionError> {
        let now = self.clock.now();
        self.reconcile_at(now);

        if self.overflow_pending {
            self.overflow_pending = false;
            self.record(
                now,
                SessionEvent::AttemptRejected {
                    kind: ErrorKind::DurationOverflow,
                    duration: self.duration,
                },
            );
            return Err(SessionError::DurationOverflow {
                duration: self.duration,
                max_time: self.definition.time_limits.max_time.unwrap_or(self.duration),
            });
        }

        if self.state != ItemSessionState::Interacting {
            return Err(self.violation("end an attempt"));
        }

        let limits = self.definition.time_limits;
        let total = self.live_duration(now);

        if let Some(min_time) = limits.min_time
            && limits.is_underflowed(total)
        {
            self.duration = total;
            self.time_reference = now;
            let exhausted = self.attempt_policy().remaining(self.num_attempts) == Some(0);
            self.state = if exhausted {
                ItemSessionState::Closed
            } else {
                ItemSessionState::Suspended
            };
            self.sync_built_ins();

            warn!(
                item_id = %self.definition.id,
                duration = %total,
                min_time = %min_time,
                state = %self.state,
                "Attempt ended below the minimum time"
            );
            self.record(
                now,
                SessionEvent::AttemptRejected {
                    kind: ErrorKind::DurationUnderflow,
                    duration: total,
                },
            );
            return Err(SessionError::DurationUnderflow {
                duration: total,
                min_time,
                remaining_attempts: self.remaining_attempts(),
            });
        }

        // Processing runs against a copy so a failure leaves the session untouched
        let mut candidate = self.variables.clone();
        candidate.apply_responses(&responses)?;
        candidate.set_built_ins(total, self.num_attempts);

        if !self.definition.control.allow_skipping && !candidate.has_responded() {
            debug!(item_id = %self.definition.id, "Skipping forbidden");
            return Err(SessionError::SkippingForbidden);
        }

        let updates = self.processor.process(&candidate).map_err(|e| {
            warn!(item_id = %self.definition.id, error = %e, "Response processing failed");
            SessionError::Processing(e)
        })?;
        candidate.apply_outcomes(updates)?;
        if !self.definition.adaptive {
            candidate.set_completion_status(CompletionStatus::Completed);
        }

        let late_submission = limits.is_overflowed(total, self.acceptable_latency);
        let close = late_submission
            || if self.definition.adaptive {
                candidate.completion_status() == Some(CompletionStatus::Completed)
            } else {
                self.attempt_policy().remaining(self.num_attempts) == Some(0)
            };

        self.variables = candidate;
        self.duration = total;
        self.time_reference = now;
        self.state = if close {
            ItemSessionState::Closed
        } else {
            ItemSessionState::Suspended
        };
        self.sync_built_ins();

        info!(
            session_id = %self.id,
            item_id = %self.definition.id,
            num_attempts = self.num_attempts,
            duration = %total,
            state = %self.state,
            late_submission,
            "Attempt ended"
        );
        self.record(
            now,
            SessionEvent::AttemptEnded {
                attempt: self.num_attempts,
                duration: total,
                state: self.state,
                late_submission,
            },
        );

        Ok(AttemptResult {
            state: self.state,
            duration: total,
            late_submission,
        })
    }

    /// Close the session from any open state. An open attempt has its time
    /// accounted for but is not processed. An attempt that already ran out of
    /// time, with the closure not yet reported, is closed without error.
    pub fn end_item_session(&mut self) -> Result<(), SessionError> {
        let now = self.clock.now();
        self.reconcile_at(now);

        if self.overflow_pending {
            self.overflow_pending = false;
        } else if self.state == ItemSessionState::Closed {
            return Err(self.violation("end the session"));
        }

        if self.state == ItemSessionState::Interacting {
            self.duration = self.live_duration(now);
            self.time_reference = now;
        }
        self.state = ItemSessionState::Closed;
        self.sync_built_ins();

        info!(
            session_id = %self.id,
            item_id = %self.definition.id,
            duration = %self.duration,
            num_attempts = self.num_attempts,
            "Item session ended"
        );
        self.record(
            now,
            SessionEvent::SessionEnded {
                duration: self.duration,
                num_attempts: self.num_attempts,
            },
        );
        Ok(())
    }

    /// Close an open attempt that has run out of time. Idempotent.
    pub fn reconcile_time_overflow(&mut self) {
        let now = self.clock.now();
        self.reconcile_at(now);
    }

    fn reconcile_at(&mut self, now: DateTime<Utc>) {
        if self.state != ItemSessionState::Interacting
            || self.definition.time_limits.allow_late_submission
        {
            return;
        }
        let Some(threshold) = self
            .definition
            .time_limits
            .overflow_threshold(self.acceptable_latency)
        else {
            return;
        };

        let live = self.live_duration(now);
        if live < threshold {
            return;
        }

        self.duration = threshold;
        self.time_reference = now;
        self.state = ItemSessionState::Closed;
        self.overflow_pending = true;
        self.sync_built_ins();

        warn!(
            session_id = %self.id,
            item_id = %self.definition.id,
            duration = %threshold,
            "Attempt ran out of time, session closed"
        );
        self.record(now, SessionEvent::TimeOverflowClosed { duration: threshold });
    }

    fn live_duration(&self, now: DateTime<Utc>) -> Duration {
        if self.state == ItemSessionState::Interacting {
            self.duration + Duration::between(self.time_reference, now)
        } else {
            self.duration
        }
    }

    /// Adaptive items are not limited by attempt count
    fn attempt_policy(&self) -> AttemptPolicy {
        if self.definition.adaptive {
            AttemptPolicy::unlimited()
        } else {
            self.definition.control.attempts
        }
    }

    fn not_attemptable_reason(&self) -> Option<&'static str> {
        if self.state != ItemSessionState::Suspended {
            return Some("no suspended session");
        }
        if self.attempt_policy().remaining(self.num_attempts) == Some(0) {
            return Some("no attempts left");
        }
        if self
            .definition
            .time_limits
            .rejects_overflow(self.duration, self.acceptable_latency)
        {
            return Some("no time left");
        }
        None
    }

    fn sync_built_ins(&mut self) {
        self.variables.set_built_ins(self.duration, self.num_attempts);
    }

    fn violation(&self, operation: &'static str) -> SessionError {
        SessionError::StateViolation {
            operation,
            state: self.state,
        }
    }

    fn record(&mut self, at: DateTime<Utc>, event: SessionEvent) {
        self.events.push(RecordedEvent { at, event });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MatchCorrect, NoResponseProcessing, OutcomeUpdates, ProcessingError};
    use chrono::TimeZone;
    use qti_types::{BaseType, SessionControl, TimeConstraint, VariableDeclaration};
    use qti_util::ManualClock;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap())
    }

    fn choice_item() -> ItemDefinition {
        ItemDefinition::new("Q01")
            .with_variable(
                VariableDeclaration::response("RESPONSE", BaseType::Identifier)
                    .with_correct_response(Value::Identifier("ChoiceB".into())),
            )
            .with_variable(VariableDeclaration::outcome("SCORE", BaseType::Float))
    }

    fn session(item: ItemDefinition, clock: &ManualClock) -> ItemSession {
        ItemSession::new(
            item,
            Arc::new(clock.clone()),
            Arc::new(MatchCorrect::new("RESPONSE", "SCORE")),
        )
    }

    fn answer(choice: &str) -> ResponseSet {
        ResponseSet::new().with("RESPONSE", Value::Identifier(choice.into()))
    }

    fn score(session: &mut ItemSession) -> Option<Value> {
        session.value("SCORE").unwrap()
    }

    #[test]
    fn test_new_session_is_initial() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);

        assert_eq!(s.state(), ItemSessionState::Initial);
        assert_eq!(s.num_attempts(), 0);
        assert!(!s.is_attemptable());
        assert!(matches!(
            s.begin_attempt(),
            Err(SessionError::StateViolation { .. })
        ));
    }

    #[test]
    fn test_begin_session_twice_is_violation() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);

        s.begin_session().unwrap();
        assert_eq!(s.state(), ItemSessionState::Suspended);
        assert_eq!(s.duration(), Duration::ZERO);
        assert_eq!(s.completion_status(), Some(CompletionStatus::NotAttempted));

        let err = s.begin_session().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateViolation);
    }

    #[test]
    fn test_duration_accumulates_only_while_interacting() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);

        s.begin_session().unwrap();
        clock.advance_secs(2);
        assert_eq!(s.duration(), Duration::ZERO);

        s.begin_attempt().unwrap();
        clock.advance_secs(15);
        assert_eq!(s.duration(), secs(15));

        let result = s.end_attempt(answer("ChoiceB")).unwrap();
        assert_eq!(result.duration, secs(15));
        assert_eq!(result.state, ItemSessionState::Closed);
        assert!(!result.late_submission);

        clock.advance_secs(100);
        assert_eq!(s.duration(), secs(15));
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(
            s.value("duration").unwrap(),
            Some(Value::Duration(secs(15)))
        );
    }

    #[test]
    fn test_suspended_time_is_not_counted() {
        let clock = clock();
        let item = choice_item().with_control(SessionControl::default().with_max_attempts(3));
        let mut s = session(item, &clock);

        s.begin_session().unwrap();
        s.begin_attempt().unwrap();
        clock.advance_secs(5);
        s.end_attempt(answer("ChoiceA")).unwrap();
        assert_eq!(s.state(), ItemSessionState::Suspended);

        clock.advance_secs(60);
        s.begin_attempt().unwrap();
        clock.advance_secs(7);
        s.end_attempt(answer("ChoiceB")).unwrap();

        assert_eq!(s.duration(), secs(12));
        assert_eq!(s.num_attempts(), 2);
    }

    #[test]
    fn test_scoring_and_single_attempt_closure() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);

        s.begin_session().unwrap();
        assert_eq!(s.remaining_attempts(), Some(1));
        s.begin_attempt().unwrap();
        assert_eq!(s.remaining_attempts(), Some(0));
        assert_eq!(s.completion_status(), Some(CompletionStatus::Unknown));

        s.end_attempt(answer("ChoiceB")).unwrap();
        assert_eq!(score(&mut s), Some(Value::Float(1.0)));
        assert_eq!(s.completion_status(), Some(CompletionStatus::Completed));
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert!(!s.is_attemptable());
        assert!(matches!(
            s.begin_attempt(),
            Err(SessionError::StateViolation { .. })
        ));
    }

    #[test]
    fn test_remaining_attempts_decrease_per_attempt() {
        let clock = clock();
        let item = choice_item().with_control(SessionControl::default().with_max_attempts(3));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();

        for expected in [2, 1, 0] {
            s.begin_attempt().unwrap();
            assert_eq!(s.remaining_attempts(), Some(expected));
            s.end_attempt(answer("ChoiceA")).unwrap();
        }

        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.num_attempts(), 3);
    }

    #[test]
    fn test_unlimited_attempts_stay_suspended() {
        let clock = clock();
        let item = choice_item().with_control(SessionControl::default().with_max_attempts(0));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();

        for _ in 0..5 {
            assert_eq!(s.remaining_attempts(), None);
            s.begin_attempt().unwrap();
            s.end_attempt(answer("ChoiceB")).unwrap();
            assert_eq!(s.state(), ItemSessionState::Suspended);
        }

        s.end_item_session().unwrap();
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.remaining_attempts(), Some(0));
    }

    #[test]
    fn test_outcomes_reset_each_attempt() {
        let clock = clock();
        let item = choice_item().with_control(SessionControl::default().with_max_attempts(2));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();

        s.begin_attempt().unwrap();
        s.end_attempt(answer("ChoiceB")).unwrap();
        assert_eq!(score(&mut s), Some(Value::Float(1.0)));

        s.begin_attempt().unwrap();
        assert_eq!(score(&mut s), Some(Value::Float(0.0)));
        // responses survive between attempts
        assert_eq!(
            s.value("RESPONSE").unwrap(),
            Some(Value::Identifier("ChoiceB".into()))
        );
    }

    #[test]
    fn test_underflow_with_attempts_left() {
        let clock = clock();
        let item = choice_item()
            .with_time_limits(TimeConstraint::new(Some(secs(1)), Some(secs(2))))
            .with_control(SessionControl::default().with_max_attempts(2));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();

        s.begin_attempt().unwrap();
        let err = s.end_attempt(answer("ChoiceB")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DurationUnderflow);
        assert!(matches!(
            err,
            SessionError::DurationUnderflow {
                remaining_attempts: Some(1),
                ..
            }
        ));
        assert_eq!(s.num_attempts(), 1);
        assert_eq!(s.state(), ItemSessionState::Suspended);
        assert_eq!(score(&mut s), Some(Value::Float(0.0)));

        // second attempt respects the limits
        s.begin_attempt().unwrap();
        clock.advance_secs(1);
        let result = s.end_attempt(answer("ChoiceB")).unwrap();
        assert_eq!(result.state, ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(1));
        assert_eq!(score(&mut s), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_underflow_on_last_attempt_closes() {
        let clock = clock();
        let item = choice_item().with_time_limits(TimeConstraint::new(Some(secs(5)), None));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();

        s.begin_attempt().unwrap();
        clock.advance_secs(3);
        let err = s.end_attempt(answer("ChoiceB")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::DurationUnderflow {
                remaining_attempts: Some(0),
                ..
            }
        ));
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(3));
    }

    #[test]
    fn test_overflow_caps_duration() {
        let clock = clock();
        let item = choice_item().with_time_limits(TimeConstraint::new(None, Some(secs(30))));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();

        s.begin_attempt().unwrap();
        clock.advance_secs(60);

        let err = s.end_attempt(answer("ChoiceB")).unwrap_err();
        assert_eq!(
            err,
            SessionError::DurationOverflow {
                duration: secs(30),
                max_time: secs(30),
            }
        );
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(30));
        assert_eq!(s.num_attempts(), 1);
        // the response was never processed
        assert_eq!(score(&mut s), Some(Value::Float(0.0)));
        assert_eq!(s.remaining_time(), Some(Duration::ZERO));

        // reported once, then the session is simply closed
        let err = s.end_attempt(answer("ChoiceB")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateViolation);
    }

    #[test]
    fn test_state_read_forces_overflow_closure() {
        let clock = clock();
        let item = choice_item().with_time_limits(TimeConstraint::new(None, Some(secs(10))));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();

        clock.advance_secs(9);
        assert_eq!(s.state(), ItemSessionState::Interacting);
        assert_eq!(s.remaining_time(), Some(secs(1)));

        clock.advance_secs(1);
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(10));

        clock.advance_secs(50);
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(10));

        let events = s.drain_events();
        let closures = events
            .iter()
            .filter(|e| matches!(e.event, SessionEvent::TimeOverflowClosed { .. }))
            .count();
        assert_eq!(closures, 1);
    }

    #[test]
    fn test_acceptable_latency() {
        let clock = clock();
        let item = choice_item().with_time_limits(TimeConstraint::new(Some(secs(1)), Some(secs(2))));
        let mut s = session(item, &clock).with_acceptable_latency(secs(1));
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();

        clock.advance_secs(2);
        assert_eq!(s.state(), ItemSessionState::Interacting);

        clock.advance_secs(1);
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(3));
        assert_eq!(s.remaining_time(), Some(Duration::ZERO));

        let err = s.end_attempt(ResponseSet::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DurationOverflow);
    }

    #[test]
    fn test_late_submission_is_scored_and_closes() {
        let clock = clock();
        let item = choice_item()
            .with_time_limits(TimeConstraint::new(None, Some(secs(30))).with_late_submission(true))
            .with_control(SessionControl::default().with_max_attempts(5));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();

        clock.advance_secs(60);
        assert_eq!(s.state(), ItemSessionState::Interacting);

        let result = s.end_attempt(answer("ChoiceB")).unwrap();
        assert!(result.late_submission);
        assert_eq!(result.state, ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(60));
        assert_eq!(s.num_attempts(), 1);
        assert_eq!(score(&mut s), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_end_item_session_mid_attempt() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();
        s.set_variable("RESPONSE", Some(Value::Identifier("ChoiceB".into())))
            .unwrap();

        clock.advance_secs(10);
        s.end_item_session().unwrap();

        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(10));
        assert_eq!(score(&mut s), Some(Value::Float(0.0)));
        assert!(matches!(
            s.end_item_session(),
            Err(SessionError::StateViolation { .. })
        ));
    }

    #[test]
    fn test_end_item_session_after_time_ran_out() {
        let clock = clock();
        let item = choice_item().with_time_limits(TimeConstraint::new(None, Some(secs(30))));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();

        clock.advance_secs(60);
        s.end_item_session().unwrap();

        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(30));
        assert!(matches!(
            s.end_attempt(ResponseSet::new()),
            Err(SessionError::StateViolation { .. })
        ));
        assert!(matches!(
            s.end_item_session(),
            Err(SessionError::StateViolation { .. })
        ));

        let events: Vec<_> = s.drain_events().into_iter().map(|r| r.event).collect();
        assert!(matches!(
            events.as_slice(),
            [
                SessionEvent::SessionBegan,
                SessionEvent::AttemptBegan { attempt: 1 },
                SessionEvent::TimeOverflowClosed { .. },
                SessionEvent::SessionEnded { num_attempts: 1, .. },
            ]
        ));
    }

    #[test]
    fn test_variables_report_live_duration() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();
        clock.advance_secs(7);

        let variables = s.variables();
        assert_eq!(
            variables.get(DURATION_VARIABLE),
            Some(&Value::Duration(secs(7)))
        );
        assert_eq!(s.value(DURATION_VARIABLE).unwrap(), Some(Value::Duration(secs(7))));
        assert_eq!(
            variables.get(NUM_ATTEMPTS_VARIABLE),
            Some(&Value::Integer(1))
        );
    }

    #[test]
    fn test_end_item_session_from_initial() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);
        s.end_item_session().unwrap();
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert!(matches!(
            s.begin_session(),
            Err(SessionError::StateViolation { .. })
        ));
    }

    #[test]
    fn test_variable_access_rules() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);
        s.begin_session().unwrap();

        // responses only while interacting
        let err = s
            .set_variable("RESPONSE", Some(Value::Identifier("ChoiceA".into())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateViolation);

        assert!(matches!(
            s.set_variable("duration", Some(Value::Duration(secs(1)))),
            Err(SessionError::ReadOnlyVariable(_))
        ));
        assert!(matches!(
            s.set_variable("numAttempts", Some(Value::Integer(3))),
            Err(SessionError::ReadOnlyVariable(_))
        ));
        assert!(matches!(
            s.value("NOPE"),
            Err(SessionError::UnknownVariable(_))
        ));

        s.begin_attempt().unwrap();
        s.set_variable("RESPONSE", Some(Value::Identifier("ChoiceB".into())))
            .unwrap();
        let err = s.set_variable("RESPONSE", Some(Value::Integer(2))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidVariable);

        // response set earlier is used when the submission omits it
        s.end_attempt(ResponseSet::new()).unwrap();
        assert_eq!(score(&mut s), Some(Value::Float(1.0)));

        // closed sessions are immutable
        assert_eq!(
            s.set_variable("SCORE", Some(Value::Float(0.5)))
                .unwrap_err()
                .kind(),
            ErrorKind::StateViolation
        );
        assert_eq!(s.value("numAttempts").unwrap(), Some(Value::Integer(1)));
    }

    #[test]
    fn test_processing_failure_leaves_session_unchanged() {
        let clock = clock();
        let failing = |_: &VariableState| -> Result<OutcomeUpdates, ProcessingError> {
            Err(ProcessingError::new("division by zero"))
        };
        let mut s = ItemSession::new(choice_item(), Arc::new(clock.clone()), Arc::new(failing));
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();
        clock.advance_secs(4);

        let err = s.end_attempt(answer("ChoiceB")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessingFailure);
        assert_eq!(s.state(), ItemSessionState::Interacting);
        assert_eq!(s.value("RESPONSE").unwrap(), None);
        assert_eq!(s.duration(), secs(4));
    }

    #[test]
    fn test_skipping_forbidden() {
        let clock = clock();
        let item = choice_item().with_control(SessionControl::default().with_allow_skipping(false));
        let mut s = session(item, &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();

        let err = s.end_attempt(ResponseSet::new()).unwrap_err();
        assert_eq!(err, SessionError::SkippingForbidden);
        assert_eq!(s.state(), ItemSessionState::Interacting);

        s.end_attempt(answer("ChoiceA")).unwrap();
        assert_eq!(s.state(), ItemSessionState::Closed);
    }

    #[test]
    fn test_skipping_allowed_by_default() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();

        let result = s.end_attempt(ResponseSet::new()).unwrap();
        assert_eq!(result.state, ItemSessionState::Closed);
        assert_eq!(score(&mut s), Some(Value::Float(0.0)));
    }

    #[test]
    fn test_adaptive_item_closes_on_completion() {
        let clock = clock();
        let item = choice_item()
            .with_adaptive(true)
            .with_control(SessionControl::default().with_max_attempts(1));
        let mut s = ItemSession::new(
            item,
            Arc::new(clock.clone()),
            Arc::new(MatchCorrect::new("RESPONSE", "SCORE").with_adaptive(true)),
        );
        s.begin_session().unwrap();

        // attempt limit is ignored
        for _ in 0..3 {
            s.begin_attempt().unwrap();
            let result = s.end_attempt(answer("ChoiceA")).unwrap();
            assert_eq!(result.state, ItemSessionState::Suspended);
            assert_eq!(s.completion_status(), Some(CompletionStatus::Incomplete));
        }
        assert_eq!(s.remaining_attempts(), None);

        s.begin_attempt().unwrap();
        s.end_attempt(answer("ChoiceB")).unwrap();
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.completion_status(), Some(CompletionStatus::Completed));
        assert_eq!(s.num_attempts(), 4);
    }

    #[test]
    fn test_no_attempt_after_time_used_up() {
        let clock = clock();
        let item = choice_item()
            .with_time_limits(TimeConstraint::new(None, Some(secs(10))))
            .with_control(SessionControl::default().with_max_attempts(0));
        let mut s = ItemSession::new(item, Arc::new(clock.clone()), Arc::new(NoResponseProcessing));
        s.begin_session().unwrap();

        s.begin_attempt().unwrap();
        clock.advance_secs(6);
        s.end_attempt(ResponseSet::new()).unwrap();
        assert!(s.is_attemptable());
        assert_eq!(s.remaining_time(), Some(secs(4)));

        s.begin_attempt().unwrap();
        clock.advance_secs(4);
        assert_eq!(s.state(), ItemSessionState::Closed);
        assert_eq!(s.duration(), secs(10));
        assert!(!s.is_attemptable());
    }

    #[test]
    fn test_snapshot_restore_continues_attempt() {
        let clock = clock();
        let item = choice_item().with_time_limits(TimeConstraint::new(None, Some(secs(30))));
        let mut s = session(item.clone(), &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();
        s.set_variable("RESPONSE", Some(Value::Identifier("ChoiceB".into())))
            .unwrap();
        clock.advance_secs(5);

        let snapshot = s.snapshot();
        assert_eq!(snapshot.state, ItemSessionState::Interacting);
        assert_eq!(snapshot.num_attempts, 1);

        let json = serde_json::to_string(&snapshot).unwrap();
        let snapshot: ItemSessionSnapshot = serde_json::from_str(&json).unwrap();

        let mut restored = ItemSession::restore(
            item,
            &snapshot,
            Arc::new(clock.clone()),
            Arc::new(MatchCorrect::new("RESPONSE", "SCORE")),
        )
        .unwrap();
        assert_eq!(restored.id(), s.id());

        clock.advance_secs(5);
        assert_eq!(restored.duration(), secs(10));
        let result = restored.end_attempt(ResponseSet::new()).unwrap();
        assert_eq!(result.state, ItemSessionState::Closed);
        assert_eq!(score(&mut restored), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_restored_overflow_is_reported() {
        let clock = clock();
        let item = choice_item().with_time_limits(TimeConstraint::new(None, Some(secs(10))));
        let mut s = session(item.clone(), &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();
        clock.advance_secs(20);

        let snapshot = s.snapshot();
        assert_eq!(snapshot.state, ItemSessionState::Closed);
        assert!(snapshot.overflow_pending);

        let mut restored = ItemSession::restore(
            item,
            &snapshot,
            Arc::new(clock.clone()),
            Arc::new(NoResponseProcessing),
        )
        .unwrap();
        let err = restored.end_attempt(ResponseSet::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DurationOverflow);
    }

    #[test]
    fn test_restore_rejects_foreign_snapshot() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);
        let snapshot = s.snapshot();

        let err = ItemSession::restore(
            ItemDefinition::new("Q02"),
            &snapshot,
            Arc::new(clock.clone()),
            Arc::new(NoResponseProcessing),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::ItemMismatch { .. }));

        let mut bad = snapshot.clone();
        bad.variables.insert("SCORE".into(), Some(Value::Boolean(true)));
        let err = ItemSession::restore(
            choice_item(),
            &bad,
            Arc::new(clock.clone()),
            Arc::new(NoResponseProcessing),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidVariable);
    }

    #[test]
    fn test_events_follow_transitions() {
        let clock = clock();
        let mut s = session(choice_item(), &clock);
        s.begin_session().unwrap();
        s.begin_attempt().unwrap();
        clock.advance_secs(3);
        s.end_attempt(answer("ChoiceB")).unwrap();

        let events: Vec<SessionEvent> = s.drain_events().into_iter().map(|e| e.event).collect();
        assert_eq!(
            events,
            vec![
                SessionEvent::SessionBegan,
                SessionEvent::AttemptBegan { attempt: 1 },
                SessionEvent::AttemptEnded {
                    attempt: 1,
                    duration: secs(3),
                    state: ItemSessionState::Closed,
                    late_submission: false,
                },
            ]
        );
        assert!(s.drain_events().is_empty());
    }
}
