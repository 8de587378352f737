//! Error types for the Reef driver.

use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Reef driver.
#[derive(Debug, Error)]
pub enum Error {
    /// A session was used after release or after it ended, or released
    /// while not checked out. Local programming-contract violation,
    /// surfaced immediately and never retried.
    #[error("invalid session state: {0}")]
    InvalidSessionState(String),

    /// The client has been closed; no further operations are permitted.
    #[error("client is closed")]
    ClientClosed,

    /// Remote server error with full context.
    #[error("{name}: {message}")]
    Remote {
        /// Error type name reported by the server.
        name: String,
        /// Human-readable error message.
        message: String,
        /// Server error code (if available).
        code: Option<i32>,
    },

    /// The batched `endSessions` command failed at connection close.
    /// Logged and swallowed by the close path; server-side sessions
    /// self-expire after the idle timeout.
    #[error("session termination failed: {0}")]
    SessionTermination(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Convenience constructor for remote errors.
    pub fn remote(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Remote {
            name: name.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Returns the error name if this is a remote error.
    pub fn error_name(&self) -> Option<&str> {
        match self {
            Error::Remote { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns true if this is a session-state contract violation.
    pub fn is_invalid_session_state(&self) -> bool {
        matches!(self, Error::InvalidSessionState(_))
    }

    /// Returns true if the client was closed.
    pub fn is_client_closed(&self) -> bool {
        matches!(self, Error::ClientClosed)
    }
}
