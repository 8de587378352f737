//! Command documents sent to the server.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::SessionId;

/// Logical name of the batched session-termination command.
pub const END_SESSIONS: &str = "endSessions";

/// A command as dispatched to the server.
///
/// `name` is the logical command name used for monitoring; `body` is the
/// full command document placed on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Logical command name (e.g. `"find"`, `"endSessions"`).
    pub name: String,
    /// Full command document.
    pub body: Value,
}

impl Command {
    /// Creates a command from a name and body document.
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Builds the batched termination command for a set of session ids:
    /// `{"endSessions": [{"id": ...}, ...]}`.
    pub fn end_sessions(ids: &[SessionId]) -> Self {
        let ids: Vec<Value> = ids.iter().map(SessionId::to_document).collect();
        Self::new(END_SESSIONS, json!({ "endSessions": ids }))
    }
}
