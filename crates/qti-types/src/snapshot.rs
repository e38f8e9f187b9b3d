//! Persistable view of an item session

use chrono::{DateTime, Utc};
use qti_util::{ItemId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Duration, ItemSessionState, Value};

/// Complete attribute set of an item session.
///
/// Restoring from a snapshot does not depend on field or variable order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSessionSnapshot {
    pub session_id: SessionId,
    pub item_id: ItemId,
    pub state: ItemSessionState,
    /// Accumulated duration, frozen at the last transition
    pub duration: Duration,
    pub num_attempts: u32,
    pub time_reference: DateTime<Utc>,
    /// An attempt was force-closed for running out of time and the
    /// overflow has not been reported by `end_attempt` yet
    #[serde(default)]
    pub overflow_pending: bool,
    /// Values of all declared and built-in variables (None is NULL)
    pub variables: BTreeMap<String, Option<Value>>,
}
