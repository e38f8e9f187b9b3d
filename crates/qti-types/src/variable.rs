//! Variable declarations

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BaseType, Cardinality, Value, ValueError};

/// Built-in response variable holding the accumulated attempt time
pub const DURATION_VARIABLE: &str = "duration";

/// Built-in response variable counting attempts
pub const NUM_ATTEMPTS_VARIABLE: &str = "numAttempts";

/// Built-in outcome variable tracking completion
pub const COMPLETION_STATUS_VARIABLE: &str = "completionStatus";

/// Identifiers reserved for built-in variables
pub const BUILT_IN_VARIABLES: [&str; 3] = [
    DURATION_VARIABLE,
    NUM_ATTEMPTS_VARIABLE,
    COMPLETION_STATUS_VARIABLE,
];

pub fn is_built_in(identifier: &str) -> bool {
    BUILT_IN_VARIABLES.contains(&identifier)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Set by the candidate during an attempt
    Response,
    /// Set by response processing
    Outcome,
    /// Fixed for the session by the delivery system
    Template,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableKind::Response => "response",
            VariableKind::Outcome => "outcome",
            VariableKind::Template => "template",
        };
        f.write_str(name)
    }
}

/// Static definition of an item variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub identifier: String,
    pub kind: VariableKind,
    pub base_type: BaseType,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub default_value: Option<Value>,
    /// Only meaningful for response variables
    #[serde(default)]
    pub correct_response: Option<Value>,
}

impl VariableDeclaration {
    pub fn new(
        identifier: impl Into<String>,
        kind: VariableKind,
        base_type: BaseType,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            base_type,
            cardinality,
            default_value: None,
            correct_response: None,
        }
    }

    pub fn response(identifier: impl Into<String>, base_type: BaseType) -> Self {
        Self::new(identifier, VariableKind::Response, base_type, Cardinality::Single)
    }

    pub fn outcome(identifier: impl Into<String>, base_type: BaseType) -> Self {
        Self::new(identifier, VariableKind::Outcome, base_type, Cardinality::Single)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_correct_response(mut self, value: Value) -> Self {
        self.correct_response = Some(value);
        self
    }

    /// Value the variable takes when reset.
    ///
    /// Numeric single outcomes without an explicit default start at zero.
    pub fn initial_value(&self) -> Option<Value> {
        if self.default_value.is_some() {
            return self.default_value.clone();
        }

        match (self.kind, self.cardinality, self.base_type) {
            (VariableKind::Outcome, Cardinality::Single, BaseType::Integer) => {
                Some(Value::Integer(0))
            }
            (VariableKind::Outcome, Cardinality::Single, BaseType::Float) => {
                Some(Value::Float(0.0))
            }
            _ => None,
        }
    }

    /// Check that `value` fits this declaration
    pub fn check(&self, value: &Value) -> Result<(), ValueError> {
        if value.fits(self.base_type, self.cardinality) {
            Ok(())
        } else {
            Err(ValueError::Mismatch {
                expected_type: self.base_type,
                expected_cardinality: self.cardinality,
                found: value.to_string(),
            })
        }
    }
}
