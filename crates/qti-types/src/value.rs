//! Runtime values held by item variables

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{Duration, DurationParseError};

/// Primitive type of a variable's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    Boolean,
    Integer,
    Float,
    String,
    Identifier,
    Duration,
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Float => "float",
            BaseType::String => "string",
            BaseType::Identifier => "identifier",
            BaseType::Duration => "duration",
        };
        f.write_str(name)
    }
}

/// How many values a variable holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Single,
    /// Unordered container; equality ignores order
    Multiple,
    Ordered,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
            Cardinality::Ordered => "ordered",
        };
        f.write_str(name)
    }
}

/// Errors converting raw input into a [`Value`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("'{raw}' is not a valid {base_type}")]
    Malformed { raw: String, base_type: BaseType },

    #[error(transparent)]
    Duration(#[from] DurationParseError),

    #[error("expected {expected_cardinality} {expected_type}, found {found}")]
    Mismatch {
        expected_type: BaseType,
        expected_cardinality: Cardinality,
        found: String,
    },
}

/// A non-null value. Absence of a value (QTI NULL) is `Option::None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    Duration(Duration),
    Multiple(Vec<Value>),
    Ordered(Vec<Value>),
}

impl Value {
    /// Base type of a single value, or of the first element of a container.
    /// Empty containers have no base type.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Value::Boolean(_) => Some(BaseType::Boolean),
            Value::Integer(_) => Some(BaseType::Integer),
            Value::Float(_) => Some(BaseType::Float),
            Value::String(_) => Some(BaseType::String),
            Value::Identifier(_) => Some(BaseType::Identifier),
            Value::Duration(_) => Some(BaseType::Duration),
            Value::Multiple(items) | Value::Ordered(items) => {
                items.first().and_then(Value::base_type)
            }
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Value::Multiple(_) => Cardinality::Multiple,
            Value::Ordered(_) => Cardinality::Ordered,
            _ => Cardinality::Single,
        }
    }

    /// Whether this value can be stored in a variable of the given type.
    pub fn fits(&self, base_type: BaseType, cardinality: Cardinality) -> bool {
        if self.cardinality() != cardinality {
            return false;
        }
        match self {
            Value::Multiple(items) | Value::Ordered(items) => items
                .iter()
                .all(|item| item.cardinality() == Cardinality::Single && item.base_type() == Some(base_type)),
            single => single.base_type() == Some(base_type),
        }
    }

    /// Equality used for response matching: unordered containers compare
    /// as multisets, everything else structurally.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Multiple(a), Value::Multiple(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut remaining: Vec<&Value> = b.iter().collect();
                a.iter().all(|item| {
                    match remaining.iter().position(|candidate| item.matches(candidate)) {
                        Some(index) => {
                            remaining.swap_remove(index);
                            true
                        }
                        None => false,
                    }
                })
            }
            (Value::Ordered(a), Value::Ordered(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            _ => self == other,
        }
    }

    /// Numeric view of integer and float values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Value::Identifier(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a single textual value of the given base type.
    pub fn parse_single(base_type: BaseType, raw: &str) -> Result<Value, ValueError> {
        let malformed = || ValueError::Malformed {
            raw: raw.to_string(),
            base_type,
        };

        match base_type {
            BaseType::Boolean => match raw {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(malformed()),
            },
            BaseType::Integer => raw.trim().parse().map(Value::Integer).map_err(|_| malformed()),
            BaseType::Float => raw.trim().parse().map(Value::Float).map_err(|_| malformed()),
            BaseType::String => Ok(Value::String(raw.to_string())),
            BaseType::Identifier => {
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
                    Err(malformed())
                } else {
                    Ok(Value::Identifier(trimmed.to_string()))
                }
            }
            BaseType::Duration => Ok(Value::Duration(Duration::parse(raw.trim())?)),
        }
    }

    /// Parse textual input for a variable: single values as-is, containers
    /// as comma-separated lists.
    pub fn parse(
        base_type: BaseType,
        cardinality: Cardinality,
        raw: &str,
    ) -> Result<Value, ValueError> {
        match cardinality {
            Cardinality::Single => Self::parse_single(base_type, raw),
            Cardinality::Multiple | Cardinality::Ordered => {
                let items = raw
                    .split(',')
                    .filter(|part| !part.trim().is_empty())
                    .map(|part| Self::parse_single(base_type, part.trim()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if cardinality == Cardinality::Multiple {
                    Value::Multiple(items)
                } else {
                    Value::Ordered(items)
                })
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Identifier(s) => write!(f, "{}", s),
            Value::Duration(d) => write!(f, "{}", d),
            Value::Multiple(items) | Value::Ordered(items) => {
                let (open, close) = if matches!(self, Value::Multiple(_)) {
                    ('{', '}')
                } else {
                    ('[', ']')
                };
                write!(f, "{}", open)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "{}", close)
            }
        }
    }
}
