//! Session and engine errors

use qti_store::StoreError;
use qti_types::{Duration, ItemSessionState, ValueError};
use qti_util::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Broad classification of session failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transition attempted from an illegal state, or item not attemptable
    StateViolation,
    /// Attempt ran past the maximum time without late submission allowed
    DurationOverflow,
    /// Attempt ended before the minimum time
    DurationUnderflow,
    /// Malformed textual value
    InvalidFormat,
    /// Response processing failed or produced unusable outcomes
    ProcessingFailure,
    /// Attempt ended without any response while skipping is forbidden
    SkippingForbidden,
    /// Unknown, read-only or mistyped variable
    InvalidVariable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::StateViolation => "state_violation",
            ErrorKind::DurationOverflow => "duration_overflow",
            ErrorKind::DurationUnderflow => "duration_underflow",
            ErrorKind::InvalidFormat => "invalid_format",
            ErrorKind::ProcessingFailure => "processing_failure",
            ErrorKind::SkippingForbidden => "skipping_forbidden",
            ErrorKind::InvalidVariable => "invalid_variable",
        };
        f.write_str(name)
    }
}

/// Failure reported by a response processor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProcessingError {
    pub message: String,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised by item session operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("cannot {operation} while the session is {state}")]
    StateViolation {
        operation: &'static str,
        state: ItemSessionState,
    },

    #[error("item is not attemptable: {reason}")]
    NotAttemptable { reason: &'static str },

    #[error("attempt duration {duration} exceeds the maximum time {max_time}")]
    DurationOverflow { duration: Duration, max_time: Duration },

    #[error("attempt duration {duration} is below the minimum time {min_time}")]
    DurationUnderflow {
        duration: Duration,
        min_time: Duration,
        /// None when attempts are unlimited
        remaining_attempts: Option<u32>,
    },

    #[error(transparent)]
    InvalidFormat(#[from] ValueError),

    #[error("response processing failed: {0}")]
    Processing(#[from] ProcessingError),

    #[error("a response is required before ending the attempt")]
    SkippingForbidden,

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("variable '{0}' is read-only")]
    ReadOnlyVariable(String),

    #[error("variable '{identifier}': {source}")]
    TypeMismatch {
        identifier: String,
        source: ValueError,
    },

    #[error("snapshot belongs to item '{found}', not '{expected}'")]
    ItemMismatch { expected: ItemId, found: ItemId },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::StateViolation { .. }
            | SessionError::NotAttemptable { .. }
            | SessionError::ItemMismatch { .. } => ErrorKind::StateViolation,
            SessionError::DurationOverflow { .. } => ErrorKind::DurationOverflow,
            SessionError::DurationUnderflow { .. } => ErrorKind::DurationUnderflow,
            SessionError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            SessionError::Processing(_) => ErrorKind::ProcessingFailure,
            SessionError::SkippingForbidden => ErrorKind::SkippingForbidden,
            SessionError::UnknownVariable(_)
            | SessionError::ReadOnlyVariable(_)
            | SessionError::TypeMismatch { .. } => ErrorKind::InvalidVariable,
        }
    }
}

/// Errors raised by the session engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown item '{0}'")]
    UnknownItem(ItemId),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
