//! The command-execution seam consumed by the session layer.
//!
//! The driver does not encode or transport commands itself; it is handed
//! an implementation of [`CommandRunner`] (the connection layer) and
//! treats every call as an opaque remote invocation with an error channel.

use futures_util::future::BoxFuture;
use serde_json::Value;

use reef_protocol::{Command, SessionId};

use crate::error::Result;

/// Executes commands against the server and owns connection teardown.
///
/// Object-safe so the session layer can hold it as `Arc<dyn CommandRunner>`
/// without knowing the transport's concrete types.
pub trait CommandRunner: Send + Sync {
    /// Sends a command to the server, optionally scoped to a session, and
    /// awaits the reply document.
    fn execute<'a>(
        &'a self,
        command: Command,
        session: Option<SessionId>,
    ) -> BoxFuture<'a, Result<Value>>;

    /// Tears down the underlying connection.
    ///
    /// [`Client::close`](crate::Client::close) issues the batched session
    /// termination command before invoking this hook.
    fn shutdown<'a>(&'a self) -> BoxFuture<'a, Result<()>>;
}
