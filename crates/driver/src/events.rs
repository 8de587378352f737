//! Command monitoring events.
//!
//! Purely observational: handlers see every command the client dispatches
//! (including the close-time `endSessions` batch) but cannot influence
//! behavior. Mirrors the started/succeeded/failed notification triple that
//! instrumentation listeners consume.

use std::time::Duration;

use serde_json::Value;

/// Emitted immediately before a command is sent to the server.
#[derive(Debug, Clone)]
pub struct CommandStartedEvent {
    /// Logical command name (e.g. `"endSessions"`).
    pub command_name: String,
    /// Full command document as placed on the wire.
    pub command: Value,
}

/// Emitted after a command's reply arrives.
#[derive(Debug, Clone)]
pub struct CommandSucceededEvent {
    pub command_name: String,
    /// Reply document from the server.
    pub reply: Value,
    /// Wall time between dispatch and reply.
    pub duration: Duration,
}

/// Emitted after a command fails.
#[derive(Debug, Clone)]
pub struct CommandFailedEvent {
    pub command_name: String,
    /// Rendered error message.
    pub error: String,
    pub duration: Duration,
}

/// Observer for command lifecycle events.
///
/// All methods default to no-ops so handlers implement only what they
/// care about. Registered via [`Client::add_event_handler`](crate::Client::add_event_handler).
pub trait CommandEventHandler: Send + Sync {
    fn command_started(&self, _event: &CommandStartedEvent) {}
    fn command_succeeded(&self, _event: &CommandSucceededEvent) {}
    fn command_failed(&self, _event: &CommandFailedEvent) {}
}
