//! Shared utilities for QTI item sessions
//!
//! This crate provides:
//! - ID types (ItemId, CandidateId, SessionId)
//! - Clocks (system time with mock support, manual time for tests)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
