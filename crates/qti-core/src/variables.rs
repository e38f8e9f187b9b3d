//! Variable state of an item session

use qti_types::{
    BaseType, COMPLETION_STATUS_VARIABLE, CompletionStatus, DURATION_VARIABLE,
    NUM_ATTEMPTS_VARIABLE, Value, VariableDeclaration, VariableKind, is_built_in,
};
use std::collections::BTreeMap;

use crate::{ProcessingError, SessionError};

fn built_in_declarations() -> [VariableDeclaration; 3] {
    [
        VariableDeclaration::response(DURATION_VARIABLE, BaseType::Duration),
        VariableDeclaration::response(NUM_ATTEMPTS_VARIABLE, BaseType::Integer),
        VariableDeclaration::outcome(COMPLETION_STATUS_VARIABLE, BaseType::Identifier)
            .with_default(Value::Identifier(
                CompletionStatus::NotAttempted.as_str().to_string(),
            )),
    ]
}

/// Declared variables of an item together with their current values.
///
/// Always contains the built-in `duration`, `numAttempts` and
/// `completionStatus` variables. A `None` value is NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableState {
    declarations: BTreeMap<String, VariableDeclaration>,
    values: BTreeMap<String, Option<Value>>,
}

impl VariableState {
    /// Build a state holding the initial value of every variable
    pub fn new(declared: &[VariableDeclaration]) -> Self {
        let declarations: BTreeMap<String, VariableDeclaration> = built_in_declarations()
            .into_iter()
            .chain(declared.iter().cloned())
            .map(|d| (d.identifier.clone(), d))
            .collect();

        let values = declarations
            .values()
            .map(|d| (d.identifier.clone(), d.initial_value()))
            .collect();

        Self {
            declarations,
            values,
        }
    }

    pub fn declaration(&self, identifier: &str) -> Option<&VariableDeclaration> {
        self.declarations.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.declarations.contains_key(identifier)
    }

    /// Current value; None for NULL and unknown identifiers alike
    pub fn get(&self, identifier: &str) -> Option<&Value> {
        self.values.get(identifier).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn completion_status(&self) -> Option<CompletionStatus> {
        self.get(COMPLETION_STATUS_VARIABLE)
            .and_then(Value::as_identifier)
            .and_then(CompletionStatus::from_identifier)
    }

    /// Whether the candidate has given any response: some declared response
    /// variable is set to something other than its default. Items without
    /// response variables always count as responded.
    pub fn has_responded(&self) -> bool {
        let mut responses = self.declared(VariableKind::Response).peekable();
        if responses.peek().is_none() {
            return true;
        }
        responses.any(|decl| match self.get(&decl.identifier) {
            None => false,
            Some(value) => decl.default_value.as_ref() != Some(value),
        })
    }

    /// Parse textual input for a declared variable
    pub fn parse_value(&self, identifier: &str, raw: &str) -> Result<Value, SessionError> {
        let decl = self
            .declaration(identifier)
            .ok_or_else(|| SessionError::UnknownVariable(identifier.to_string()))?;
        Ok(Value::parse(decl.base_type, decl.cardinality, raw)?)
    }

    /// Values keyed by identifier, as stored in snapshots
    pub fn to_map(&self) -> BTreeMap<String, Option<Value>> {
        self.values.clone()
    }

    fn declared(&self, kind: VariableKind) -> impl Iterator<Item = &VariableDeclaration> {
        self.declarations
            .values()
            .filter(move |d| d.kind == kind && !is_built_in(&d.identifier))
    }

    /// Set a value after checking it against the declaration
    pub(crate) fn assign(
        &mut self,
        identifier: &str,
        value: Option<Value>,
    ) -> Result<(), SessionError> {
        let decl = self
            .declaration(identifier)
            .ok_or_else(|| SessionError::UnknownVariable(identifier.to_string()))?;

        if let Some(value) = &value {
            decl.check(value).map_err(|source| SessionError::TypeMismatch {
                identifier: identifier.to_string(),
                source,
            })?;

            if identifier == COMPLETION_STATUS_VARIABLE
                && value
                    .as_identifier()
                    .and_then(CompletionStatus::from_identifier)
                    .is_none()
            {
                return Err(SessionError::TypeMismatch {
                    identifier: identifier.to_string(),
                    source: qti_types::ValueError::Malformed {
                        raw: value.to_string(),
                        base_type: BaseType::Identifier,
                    },
                });
            }
        }

        self.values.insert(identifier.to_string(), value);
        Ok(())
    }

    /// Reset every declared (non built-in) variable of `kind` to its initial value
    pub(crate) fn reset(&mut self, kind: VariableKind) {
        let initial: Vec<(String, Option<Value>)> = self
            .declared(kind)
            .map(|d| (d.identifier.clone(), d.initial_value()))
            .collect();
        self.values.extend(initial);
    }

    pub(crate) fn set_built_ins(&mut self, duration: qti_types::Duration, num_attempts: u32) {
        self.values.insert(
            DURATION_VARIABLE.to_string(),
            Some(Value::Duration(duration)),
        );
        self.values.insert(
            NUM_ATTEMPTS_VARIABLE.to_string(),
            Some(Value::Integer(i64::from(num_attempts))),
        );
    }

    pub(crate) fn set_completion_status(&mut self, status: CompletionStatus) {
        self.values.insert(
            COMPLETION_STATUS_VARIABLE.to_string(),
            Some(Value::Identifier(status.as_str().to_string())),
        );
    }

    /// Apply submitted responses. Only declared response variables are accepted.
    pub(crate) fn apply_responses(&mut self, responses: &ResponseSet) -> Result<(), SessionError> {
        for (identifier, value) in responses.iter() {
            if is_built_in(identifier) {
                return Err(SessionError::ReadOnlyVariable(identifier.to_string()));
            }
            match self.declaration(identifier) {
                Some(decl) if decl.kind == VariableKind::Response => {}
                _ => return Err(SessionError::UnknownVariable(identifier.to_string())),
            }
            self.assign(identifier, value.cloned())?;
        }
        Ok(())
    }

    /// Apply outcome values computed by response processing
    pub(crate) fn apply_outcomes(&mut self, updates: OutcomeUpdates) -> Result<(), SessionError> {
        for (identifier, value) in updates.values {
            match self.declaration(&identifier) {
                Some(decl) if decl.kind == VariableKind::Outcome => {}
                _ => {
                    return Err(ProcessingError::new(format!(
                        "'{}' is not an outcome variable",
                        identifier
                    ))
                    .into());
                }
            }
            self.assign(&identifier, value).map_err(|e| {
                SessionError::Processing(ProcessingError::new(e.to_string()))
            })?;
        }
        Ok(())
    }

    pub(crate) fn restore_values(
        &mut self,
        values: &BTreeMap<String, Option<Value>>,
    ) -> Result<(), SessionError> {
        for (identifier, value) in values {
            self.assign(identifier, value.clone())?;
        }
        Ok(())
    }
}

/// Response values submitted at the end of an attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSet {
    values: BTreeMap<String, Option<Value>>,
}

impl ResponseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identifier: impl Into<String>, value: Value) -> Self {
        self.insert(identifier, Some(value));
        self
    }

    /// Set a response; `None` clears it to NULL
    pub fn insert(&mut self, identifier: impl Into<String>, value: Option<Value>) {
        self.values.insert(identifier.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

/// Outcome values produced by response processing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeUpdates {
    values: BTreeMap<String, Option<Value>>,
}

impl OutcomeUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, identifier: impl Into<String>, value: Value) -> Self {
        self.values.insert(identifier.into(), Some(value));
        self
    }

    pub fn get(&self, identifier: &str) -> Option<&Value> {
        self.values.get(identifier).and_then(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
