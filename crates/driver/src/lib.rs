//! Client-side logical session lifecycle for the Reef database.
//!
//! Reef servers recognize *logical sessions*: server-side contexts,
//! identified by a unique id, that scope causally-consistent operations
//! across commands. This crate manages those sessions on the client:
//!
//! - [`ServerSessionPool`] — pooled reuse of idle sessions with expiry,
//!   so steady load is served by a bounded set of server sessions
//! - [`Client::with_session`] — runs an operation under a session and
//!   guarantees the session is released however the operation finishes
//!   (deferred success or failure, immediate return, synchronous fault,
//!   or cancellation)
//! - [`Client::close`] — terminates every session the client ever handed
//!   out in a single batched `endSessions` command before the connection
//!   goes away
//!
//! Wire encoding, transport, and topology are out of scope: the client is
//! constructed over a [`CommandRunner`], an opaque "run this command"
//! capability with a teardown hook.

pub mod client;
pub mod error;
pub mod events;
pub mod runner;
pub mod session;

pub use client::{Client, ClientOptions, DEFAULT_SESSION_IDLE_TIMEOUT, WithSessionOptions};
pub use error::{Error, Result};
pub use events::{
    CommandEventHandler, CommandFailedEvent, CommandStartedEvent, CommandSucceededEvent,
};
pub use reef_protocol::{Command, SessionId};
pub use runner::CommandRunner;
pub use session::executor::{Completion, Operation, Outcome};
pub use session::pool::ServerSessionPool;
pub use session::{ClientSession, ServerSession};
