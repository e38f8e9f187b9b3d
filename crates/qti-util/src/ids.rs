//! Strongly-typed identifiers for item sessions

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::QtiError;

/// Check that a textual identifier can be used as an item or candidate key.
///
/// QTI identifiers start with a letter or underscore and continue with
/// letters, digits, `_`, `-` or `.`.
pub fn validate_identifier(value: &str) -> crate::Result<()> {
    let mut chars = value.chars();
    match chars.next() {
        None => return Err(QtiError::identifier(value, "must not be empty")),
        Some(c) if !(c.is_alphabetic() || c == '_') => {
            return Err(QtiError::identifier(
                value,
                "must start with a letter or underscore",
            ));
        }
        Some(_) => {}
    }

    if chars.any(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))) {
        return Err(QtiError::identifier(
            value,
            "may only contain letters, digits, '_', '-' and '.'",
        ));
    }

    Ok(())
}

/// Identifier of an assessment item in the catalog
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an id from user input, rejecting malformed identifiers
    pub fn parse(id: &str) -> crate::Result<Self> {
        validate_identifier(id)?;
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the candidate taking the item
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn parse(id: &str) -> crate::Result<Self> {
        validate_identifier(id)?;
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier of one item session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_equality() {
        let id1 = ItemId::new("choice-1");
        let id2 = ItemId::new("choice-1");
        let id3 = ItemId::new("choice-2");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn identifier_validation() {
        assert!(ItemId::parse("Q01").is_ok());
        assert!(ItemId::parse("_hidden.item-2").is_ok());
        assert!(CandidateId::parse("alice").is_ok());

        assert!(ItemId::parse("").is_err());
        assert!(ItemId::parse("1abc").is_err());
        assert!(CandidateId::parse("bob smith").is_err());
    }

    #[test]
    fn session_id_uniqueness() {
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        assert_ne!(s1, s2);
    }

    #[test]
    fn ids_serialize_deserialize() {
        let item_id = ItemId::new("Q01");
        let json = serde_json::to_string(&item_id).unwrap();
        assert_eq!(json, "\"Q01\"");
        let parsed: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(item_id, parsed);

        let session_id = SessionId::new();
        let json = serde_json::to_string(&session_id).unwrap();
        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(session_id, parsed);
    }
}
