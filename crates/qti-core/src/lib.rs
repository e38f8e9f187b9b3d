//! Item session state machine and timing engine
//!
//! This crate is the heart of the QTI session runner, containing:
//! - The item session state machine (Initial -> Suspended <-> Interacting -> Closed)
//! - Attempt and time constraint enforcement against an injected clock
//! - Variable state and the response-processing collaborator
//! - The session engine tying catalog, store and clock together

mod engine;
mod error;
mod events;
mod processing;
mod session;
mod variables;

pub use engine::*;
pub use error::*;
pub use events::*;
pub use processing::*;
pub use session::*;
pub use variables::*;
