//! Session lifecycle types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an item session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSessionState {
    /// Constructed, not yet begun
    Initial,
    /// An attempt is open and time is accumulating
    Interacting,
    /// Between attempts
    Suspended,
    /// Terminal
    Closed,
}

impl ItemSessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSessionState::Initial => "initial",
            ItemSessionState::Interacting => "interacting",
            ItemSessionState::Suspended => "suspended",
            ItemSessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ItemSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values of the built-in `completionStatus` outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    NotAttempted,
    Unknown,
    Incomplete,
    Completed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::NotAttempted => "not_attempted",
            CompletionStatus::Unknown => "unknown",
            CompletionStatus::Incomplete => "incomplete",
            CompletionStatus::Completed => "completed",
        }
    }

    pub fn from_identifier(s: &str) -> Option<Self> {
        match s {
            "not_attempted" => Some(CompletionStatus::NotAttempted),
            "unknown" => Some(CompletionStatus::Unknown),
            "incomplete" => Some(CompletionStatus::Incomplete),
            "completed" => Some(CompletionStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
