//! Data types shared by the QTI item session crates
//!
//! This crate defines:
//! - ISO 8601 durations with fixed-length calendar units
//! - Variable values, base types and cardinalities
//! - Variable declarations and the built-in variable names
//! - Time and attempt policies
//! - Session lifecycle states and snapshots

mod constraints;
mod duration;
mod snapshot;
mod types;
mod value;
mod variable;

pub use constraints::*;
pub use duration::*;
pub use snapshot::*;
pub use types::*;
pub use value::*;
pub use variable::*;
