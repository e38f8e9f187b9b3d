//! Error types shared by the QTI session crates

use thiserror::Error;

/// Errors raised by the shared utilities
#[derive(Debug, Error)]
pub enum QtiError {
    #[error("Invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },

    #[error("Invalid timestamp '{value}': expected {expected}")]
    InvalidTimestamp { value: String, expected: &'static str },
}

impl QtiError {
    pub fn identifier(value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
            reason,
        }
    }

    pub fn timestamp(value: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
            expected,
        }
    }
}

pub type Result<T> = std::result::Result<T, QtiError>;
