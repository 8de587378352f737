//! Logical session state and caller-facing session handles.
//!
//! A [`ServerSession`] is the driver's record of one server-side logical
//! session: its identifier, recency, and whether it can still be reused.
//! Callers never hold a `ServerSession` directly; they hold a
//! [`ClientSession`], an RAII handle that guarantees the underlying
//! server session is returned to the pool (implicit sessions) or tracked
//! for termination (explicit sessions) no matter how the caller's code
//! exits.

pub mod executor;
pub mod pool;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use reef_protocol::SessionId;

use crate::error::{Error, Result};
use self::pool::ServerSessionPool;

/// Ids of explicit sessions that have been started but not yet ended,
/// shared between the client and its session handles.
pub(crate) type ExplicitRegistry = Arc<Mutex<HashSet<SessionId>>>;

/// One logical server session.
///
/// Exactly one of three states at any time: idle in the pool, checked out
/// by a caller, or ended. The id never changes after creation.
#[derive(Debug)]
pub struct ServerSession {
    pub(crate) id: SessionId,
    pub(crate) last_used_at: Instant,
    pub(crate) dirty: bool,
    pub(crate) ended: bool,
}

impl ServerSession {
    pub(crate) fn new() -> Self {
        Self {
            id: SessionId::generate(),
            last_used_at: Instant::now(),
            dirty: false,
            ended: false,
        }
    }

    /// Returns the session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// True once the session has sat unused for at least `idle_timeout`.
    /// Stale sessions are never reused, only terminated.
    pub(crate) fn is_stale(&self, idle_timeout: Duration, now: Instant) -> bool {
        now.duration_since(self.last_used_at) >= idle_timeout
    }
}

/// Caller-facing handle to a logical session.
///
/// Implicit handles (pool-acquired on the caller's behalf by
/// [`Client::with_session`](crate::Client::with_session)) return their
/// server session to the pool when dropped; if an operation was still in
/// flight at that point the session is marked dirty first, so a cancelled
/// operation can never leak indeterminate server state back into the
/// pool.
///
/// Explicit handles (from [`Client::start_session`](crate::Client::start_session))
/// bypass the pool entirely. They stay registered with the client until
/// [`end`](Self::end) is called or the client closes, at which point their
/// id joins the batched termination command.
pub struct ClientSession {
    id: SessionId,
    server: Option<ServerSession>,
    pool: Arc<ServerSessionPool>,
    /// `Some` for explicit sessions; holds the client's registry so `end`
    /// can deregister the id.
    registry: Option<ExplicitRegistry>,
    in_flight: bool,
}

impl ClientSession {
    /// Acquires an implicit session from the pool.
    pub(crate) fn implicit(pool: &Arc<ServerSessionPool>) -> Self {
        let server = pool.acquire();
        Self {
            id: server.id,
            server: Some(server),
            pool: Arc::clone(pool),
            registry: None,
            in_flight: false,
        }
    }

    /// Creates an explicit session, bypassing the pool, and registers its
    /// id for eventual termination.
    pub(crate) fn explicit(pool: &Arc<ServerSessionPool>, registry: ExplicitRegistry) -> Self {
        let server = ServerSession::new();
        let id = server.id;
        registry.lock().insert(id);
        tracing::debug!(session_id = %id, "started explicit session");
        Self {
            id,
            server: Some(server),
            pool: Arc::clone(pool),
            registry: Some(registry),
            in_flight: false,
        }
    }

    /// Returns the session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// True once the session has ended; no further use is permitted.
    pub fn is_ended(&self) -> bool {
        self.server.is_none()
    }

    /// True if the last operation under this session failed, leaving
    /// server-side state indeterminate.
    pub fn is_dirty(&self) -> bool {
        self.server.as_ref().is_some_and(|s| s.dirty)
    }

    /// Ends the session.
    ///
    /// The id is scheduled into the next batched termination command. For
    /// explicit sessions this also deregisters the id from the client's
    /// close-time tracking. Ending an already-ended session is an
    /// [`Error::InvalidSessionState`].
    pub fn end(&mut self) -> Result<()> {
        let Some(mut server) = self.server.take() else {
            return Err(Error::InvalidSessionState(format!(
                "session {} already ended",
                self.id
            )));
        };
        server.ended = true;

        match &self.registry {
            Some(registry) => {
                registry.lock().remove(&server.id);
                self.pool.schedule_termination(server.id);
            }
            // Implicit sessions are checked out of the pool; an ended
            // session handed back via release is discarded into the
            // pending-termination set rather than the idle list.
            None => self.pool.release(server)?,
        }
        Ok(())
    }

    pub(crate) fn touch(&mut self) {
        if let Some(server) = self.server.as_mut() {
            server.last_used_at = Instant::now();
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        if let Some(server) = self.server.as_mut() {
            server.dirty = true;
        }
    }

    pub(crate) fn begin_operation(&mut self) {
        self.in_flight = true;
    }

    pub(crate) fn finish_operation(&mut self) {
        self.in_flight = false;
    }
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("ended", &self.is_ended())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        let Some(mut server) = self.server.take() else {
            return;
        };

        // Dropped mid-operation (e.g. the surrounding future was
        // cancelled): server-side state is indeterminate, so the session
        // must not be reused.
        if self.in_flight {
            server.dirty = true;
        }

        if self.registry.is_none() {
            if let Err(error) = self.pool.release(server) {
                tracing::warn!(session_id = %self.id, %error, "failed to release session");
            }
        }
        // Explicit sessions stay in the registry; the client terminates
        // them at close.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> Arc<ServerSessionPool> {
        Arc::new(ServerSessionPool::new(Duration::from_secs(60)))
    }

    #[test]
    fn implicit_drop_returns_session_to_pool() {
        let pool = test_pool();
        let id = {
            let session = ClientSession::implicit(&pool);
            assert_eq!(pool.checked_out_count(), 1);
            session.id()
        };
        assert_eq!(pool.checked_out_count(), 0);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.acquire().id(), id);
    }

    #[test]
    fn implicit_drop_mid_operation_discards_session() {
        let pool = test_pool();
        {
            let mut session = ClientSession::implicit(&pool);
            session.begin_operation();
        }
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.checked_out_count(), 0);
        assert_eq!(pool.end_all().len(), 1);
    }

    #[test]
    fn explicit_end_deregisters_and_schedules_termination() {
        let pool = test_pool();
        let registry: ExplicitRegistry = Arc::new(Mutex::new(HashSet::new()));
        let mut session = ClientSession::explicit(&pool, Arc::clone(&registry));
        let id = session.id();
        assert!(registry.lock().contains(&id));

        session.end().expect("first end succeeds");
        assert!(session.is_ended());
        assert!(!registry.lock().contains(&id));
        assert!(pool.end_all().contains(&id));
    }

    #[test]
    fn ending_twice_is_an_invalid_state() {
        let pool = test_pool();
        let registry: ExplicitRegistry = Arc::new(Mutex::new(HashSet::new()));
        let mut session = ClientSession::explicit(&pool, registry);
        session.end().expect("first end succeeds");
        let err = session.end().expect_err("second end fails");
        assert!(err.is_invalid_session_state());
    }

    #[test]
    fn debug_output_reports_lifecycle_state() {
        let pool = test_pool();
        let registry: ExplicitRegistry = Arc::new(Mutex::new(HashSet::new()));
        let mut session = ClientSession::explicit(&pool, registry);

        let rendered = format!("{session:?}");
        assert!(rendered.contains("ClientSession"));
        assert!(rendered.contains(&session.id().to_string()));

        session.end().expect("end session");
        assert!(format!("{session:?}").contains("ended: true"));
    }

    #[test]
    fn explicit_drop_without_end_keeps_registry_entry() {
        let pool = test_pool();
        let registry: ExplicitRegistry = Arc::new(Mutex::new(HashSet::new()));
        let id = {
            let session = ClientSession::explicit(&pool, Arc::clone(&registry));
            session.id()
        };
        assert!(registry.lock().contains(&id));
        assert_eq!(pool.checked_out_count(), 0);
    }
}
