//! The client object: session APIs, command dispatch, and lifecycle.
//!
//! One [`Client`] owns one session pool, the registry of outstanding
//! explicit sessions, and the connection (via the [`CommandRunner`] seam).
//! At close it gathers every session id still in circulation and issues a
//! single batched `endSessions` command before tearing the connection
//! down.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use reef_protocol::{Command, SessionId};

use crate::error::{Error, Result};
use crate::events::{
    CommandEventHandler, CommandFailedEvent, CommandStartedEvent, CommandSucceededEvent,
};
use crate::runner::CommandRunner;
use crate::session::executor::{self, Completion, Operation, Outcome};
use crate::session::pool::ServerSessionPool;
use crate::session::{ClientSession, ExplicitRegistry};

/// Default idle timeout for pooled sessions: the server-advertised logical
/// session lifetime.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Client construction options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// How long an idle pooled session stays eligible for reuse.
    pub session_idle_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Creates new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pooled-session idle timeout.
    pub fn session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }
}

/// Options for [`Client::with_session_opts`].
#[derive(Default)]
pub struct WithSessionOptions<'a> {
    /// Caller-supplied explicit session; when absent an implicit session
    /// is acquired from the pool for the duration of the operation.
    pub session: Option<&'a mut ClientSession>,
}

impl<'a> WithSessionOptions<'a> {
    /// Creates options with no explicit session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the operation under a caller-owned session. Ownership stays
    /// with the caller; the executor neither releases nor ends it.
    pub fn session(mut self, session: &'a mut ClientSession) -> Self {
        self.session = Some(session);
        self
    }
}

/// Handle to one logical database client.
///
/// Cheap to clone; all clones share the same pool, registry, and
/// connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    runner: Arc<dyn CommandRunner>,
    pool: Arc<ServerSessionPool>,
    /// Ids of explicit sessions started and not yet ended.
    explicit: ExplicitRegistry,
    handlers: Mutex<Vec<Arc<dyn CommandEventHandler>>>,
    closed: AtomicBool,
}

impl Client {
    /// Creates a client over an established connection.
    pub fn new(runner: Arc<dyn CommandRunner>, options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                runner,
                pool: Arc::new(ServerSessionPool::new(options.session_idle_timeout)),
                explicit: Arc::new(Mutex::new(HashSet::new())),
                handlers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a command monitoring handler. Observational only.
    pub fn add_event_handler(&self, handler: Arc<dyn CommandEventHandler>) {
        self.inner.handlers.lock().push(handler);
    }

    /// Starts an explicit session.
    ///
    /// The session bypasses the pool and remains tracked by the client: if
    /// the caller never calls [`ClientSession::end`], its id is included
    /// in the termination batch at [`close`](Self::close).
    pub fn start_session(&self) -> Result<ClientSession> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::ClientClosed);
        }
        Ok(ClientSession::explicit(
            &self.inner.pool,
            Arc::clone(&self.inner.explicit),
        ))
    }

    /// Runs an operation under an implicit pool-acquired session.
    ///
    /// See [`with_session_opts`](Self::with_session_opts) for the full
    /// contract.
    pub async fn with_session<T, F>(&self, factory: F) -> Outcome<T>
    where
        F: FnOnce(&mut ClientSession) -> Result<Operation<T>>,
    {
        executor::run(&self.inner.pool, None, factory, None).await
    }

    /// Runs an operation under a session, normalizing every completion
    /// shape into one [`Outcome`].
    ///
    /// `factory` is invoked with the session (caller-supplied via
    /// `options`, or pool-acquired) and may return deferred work, an
    /// immediate result, or fail synchronously. Whatever happens, the
    /// implicit session is released back to the pool before `completion`
    /// is invoked and before the outcome is returned; an explicit session
    /// stays with the caller. `completion`, when supplied, observes the
    /// same outcome exactly once.
    pub async fn with_session_opts<T, F>(
        &self,
        options: WithSessionOptions<'_>,
        factory: F,
        completion: Option<Completion<T>>,
    ) -> Outcome<T>
    where
        F: FnOnce(&mut ClientSession) -> Result<Operation<T>>,
    {
        executor::run(&self.inner.pool, options.session, factory, completion).await
    }

    /// Dispatches a command to the server, optionally scoped to a
    /// session, emitting monitoring events around it.
    pub async fn execute(&self, command: Command, session: Option<SessionId>) -> Result<Value> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::ClientClosed);
        }
        self.dispatch(command, session).await
    }

    /// Closes the client.
    ///
    /// Gathers every session id known to the pool plus all outstanding
    /// explicit sessions and, when the set is non-empty, issues exactly
    /// one `endSessions` command before tearing down the connection. A
    /// termination failure is logged and swallowed; server-side sessions
    /// self-expire after the idle timeout. Idempotent: a second close
    /// issues no command and returns immediately.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut ids = self.inner.pool.end_all();
        {
            let mut explicit = self.inner.explicit.lock();
            for id in explicit.drain() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        if !ids.is_empty() {
            tracing::debug!(count = ids.len(), "ending sessions");
            let command = Command::end_sessions(&ids);
            if let Err(error) = self.dispatch(command, None).await {
                let error = Error::SessionTermination(error.to_string());
                tracing::warn!(%error, "failed to end sessions during close");
            }
        }

        self.inner.runner.shutdown().await
    }

    /// Number of idle sessions in the pool.
    pub fn idle_session_count(&self) -> usize {
        self.inner.pool.idle_count()
    }

    /// Number of sessions currently checked out of the pool.
    pub fn checked_out_session_count(&self) -> usize {
        self.inner.pool.checked_out_count()
    }

    /// Number of outstanding explicit sessions.
    pub fn explicit_session_count(&self) -> usize {
        self.inner.explicit.lock().len()
    }

    async fn dispatch(&self, command: Command, session: Option<SessionId>) -> Result<Value> {
        let started_at = Instant::now();
        self.emit(|handler| {
            handler.command_started(&CommandStartedEvent {
                command_name: command.name.clone(),
                command: command.body.clone(),
            });
        });

        let name = command.name.clone();
        let result = self.inner.runner.execute(command, session).await;
        let duration = started_at.elapsed();

        match &result {
            Ok(reply) => self.emit(|handler| {
                handler.command_succeeded(&CommandSucceededEvent {
                    command_name: name.clone(),
                    reply: reply.clone(),
                    duration,
                });
            }),
            Err(error) => {
                let rendered = error.to_string();
                self.emit(|handler| {
                    handler.command_failed(&CommandFailedEvent {
                        command_name: name.clone(),
                        error: rendered.clone(),
                        duration,
                    });
                });
            }
        }
        result
    }

    fn emit(&self, notify: impl Fn(&Arc<dyn CommandEventHandler>)) {
        for handler in self.inner.handlers.lock().iter() {
            notify(handler);
        }
    }
}
