//! Core identifier types for the Reef protocol.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Identifier of a logical server session.
///
/// An opaque 128-bit value generated client-side. Collision probability is
/// negligible across the lifetime of a client process, so generation never
/// consults the server and never fails. Equality and hashing are by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh, globally-unique session identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Renders the wire form used inside session-scoped commands:
    /// `{"id": "<uuid>"}`.
    pub fn to_document(&self) -> Value {
        json!({ "id": self.0 })
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_ids() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn equality_is_by_value() {
        let id = SessionId::generate();
        let copy = id;
        assert_eq!(id, copy);
    }

    #[test]
    fn document_form_carries_the_uuid() {
        let id = SessionId::generate();
        let doc = id.to_document();
        assert_eq!(doc["id"], json!(id.as_uuid()));
    }

    #[test]
    fn serde_round_trip_is_transparent() {
        let id = SessionId::generate();
        let encoded = serde_json::to_value(id).expect("serialize");
        assert_eq!(encoded, json!(id.as_uuid()));
        let decoded: SessionId = serde_json::from_value(encoded).expect("deserialize");
        assert_eq!(decoded, id);
    }
}
