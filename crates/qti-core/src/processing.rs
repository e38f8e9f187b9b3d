//! Response processing collaborators

use qti_config::{ItemDefinition, ResponseProcessingTemplate};
use qti_types::{COMPLETION_STATUS_VARIABLE, CompletionStatus, Value};
use std::sync::Arc;

use crate::{OutcomeUpdates, ProcessingError, VariableState};

/// Computes outcome values from the variable state at the end of an attempt.
///
/// The state passed in already holds the submitted responses and the
/// updated `duration`/`numAttempts`. Processors never see the session itself.
pub trait ResponseProcessor: Send + Sync {
    fn process(&self, state: &VariableState) -> Result<OutcomeUpdates, ProcessingError>;
}

impl<F> ResponseProcessor for F
where
    F: Fn(&VariableState) -> Result<OutcomeUpdates, ProcessingError> + Send + Sync,
{
    fn process(&self, state: &VariableState) -> Result<OutcomeUpdates, ProcessingError> {
        self(state)
    }
}

/// Leaves every outcome untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResponseProcessing;

impl ResponseProcessor for NoResponseProcessing {
    fn process(&self, _state: &VariableState) -> Result<OutcomeUpdates, ProcessingError> {
        Ok(OutcomeUpdates::new())
    }
}

/// Scores 1.0 when a response matches its correct response, 0.0 otherwise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCorrect {
    pub response: String,
    pub outcome: String,
    /// Also drive `completionStatus`: completed on a match, incomplete otherwise
    pub adaptive: bool,
}

impl MatchCorrect {
    pub fn new(response: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            outcome: outcome.into(),
            adaptive: false,
        }
    }

    pub fn with_adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }
}

impl ResponseProcessor for MatchCorrect {
    fn process(&self, state: &VariableState) -> Result<OutcomeUpdates, ProcessingError> {
        let decl = state.declaration(&self.response).ok_or_else(|| {
            ProcessingError::new(format!("response '{}' is not declared", self.response))
        })?;
        let correct = decl.correct_response.as_ref().ok_or_else(|| {
            ProcessingError::new(format!(
                "response '{}' has no correct response",
                self.response
            ))
        })?;

        let matched = state
            .get(&self.response)
            .is_some_and(|given| given.matches(correct));
        let score = if matched { 1.0 } else { 0.0 };

        let mut updates = OutcomeUpdates::new().set(self.outcome.clone(), Value::Float(score));
        if self.adaptive {
            let status = if matched {
                CompletionStatus::Completed
            } else {
                CompletionStatus::Incomplete
            };
            updates = updates.set(
                COMPLETION_STATUS_VARIABLE,
                Value::Identifier(status.as_str().to_string()),
            );
        }

        Ok(updates)
    }
}

/// Processor for an item's configured template
pub fn processor_for(item: &ItemDefinition) -> Arc<dyn ResponseProcessor> {
    match &item.response_processing {
        ResponseProcessingTemplate::None => Arc::new(NoResponseProcessing),
        ResponseProcessingTemplate::MatchCorrect { response, outcome } => Arc::new(
            MatchCorrect::new(response.clone(), outcome.clone()).with_adaptive(item.adaptive),
        ),
    }
}
