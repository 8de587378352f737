//! Pooling of idle server sessions.
//!
//! The pool hands out the most-recently-released session first, so under
//! steady load the number of distinct server sessions stays bounded by
//! peak concurrency rather than total operation count. Sessions are never
//! terminated one at a time; every id that leaves circulation (stale,
//! dirty, ended) lands in a pending set that the client flushes in a
//! single batched `endSessions` command at close.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use reef_protocol::SessionId;

use crate::error::{Error, Result};
use crate::session::ServerSession;

/// Pool of idle server sessions plus the bookkeeping needed for batched
/// termination.
///
/// All state sits behind one mutex; the lock is never held across an
/// `.await` (every method here is synchronous and short).
pub struct ServerSessionPool {
    idle_timeout: Duration,
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    /// Idle sessions, most recently released at the front.
    idle: VecDeque<ServerSession>,
    /// Ids currently checked out to callers.
    checked_out: HashSet<SessionId>,
    /// Ids scheduled for the next batched termination command.
    pending_termination: HashSet<SessionId>,
    /// Set once `end_all` has drained the pool.
    closed: bool,
}

impl ServerSessionPool {
    /// Creates a pool whose idle sessions expire after `idle_timeout`.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            inner: Mutex::new(PoolInner {
                idle: VecDeque::new(),
                checked_out: HashSet::new(),
                pending_termination: HashSet::new(),
                closed: false,
            }),
        }
    }

    /// Checks a session out of the pool.
    ///
    /// Reuses the most recently released idle session if it is still
    /// fresh; otherwise prunes every stale idle session into the
    /// pending-termination set and creates a new one. Never blocks, never
    /// fails.
    pub fn acquire(&self) -> ServerSession {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if let Some(front) = inner.idle.front() {
            if !front.is_stale(self.idle_timeout, now) {
                let session = inner
                    .idle
                    .pop_front()
                    .expect("front() was Some, pop_front() must be too");
                inner.checked_out.insert(session.id);
                tracing::debug!(session_id = %session.id, "reusing pooled session");
                return session;
            }

            // The front is the most recently used entry; if it is stale,
            // everything behind it is staler.
            let PoolInner {
                idle,
                pending_termination,
                ..
            } = &mut *inner;
            for stale in idle.drain(..) {
                tracing::debug!(session_id = %stale.id, "pruning stale session");
                pending_termination.insert(stale.id);
            }
        }

        let session = ServerSession::new();
        inner.checked_out.insert(session.id);
        tracing::debug!(session_id = %session.id, "created new session");
        session
    }

    /// Returns a checked-out session to the pool.
    ///
    /// Dirty or ended sessions are discarded into the pending-termination
    /// set instead of rejoining the idle list; `last_used_at` is preserved
    /// for sessions that do rejoin. Releasing a session that is not
    /// checked out is an [`Error::InvalidSessionState`]. After `end_all`
    /// the pool is closed and late releases are dropped silently (their
    /// ids were already in the termination batch).
    pub fn release(&self, session: ServerSession) -> Result<()> {
        let mut inner = self.inner.lock();

        let was_checked_out = inner.checked_out.remove(&session.id);

        if inner.closed {
            // The termination batch has already been issued; whether this
            // id made it in or was handed out post-close, the server
            // expires the session on its own after the idle timeout.
            return Ok(());
        }

        if !was_checked_out {
            return Err(Error::InvalidSessionState(format!(
                "session {} is not checked out",
                session.id
            )));
        }

        if session.dirty || session.ended {
            tracing::debug!(
                session_id = %session.id,
                dirty = session.dirty,
                "discarding session for termination"
            );
            inner.pending_termination.insert(session.id);
        } else {
            inner.idle.push_front(session);
        }
        Ok(())
    }

    /// Schedules an id (from a session that never lived in the pool, e.g.
    /// an explicitly ended one) into the next termination batch.
    pub fn schedule_termination(&self, id: SessionId) {
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.pending_termination.insert(id);
        }
    }

    /// Drains the pool for close: every idle, checked-out, and
    /// pending-termination id is collected into one deduplicated set for
    /// the batched termination command, and the pool stops accepting
    /// sessions. Idempotent; a second call returns an empty set.
    pub fn end_all(&self) -> Vec<SessionId> {
        let mut inner = self.inner.lock();
        inner.closed = true;

        let mut ids = HashSet::new();
        for session in inner.idle.drain(..) {
            ids.insert(session.id);
        }
        ids.extend(inner.checked_out.drain());
        ids.extend(inner.pending_termination.drain());
        ids.into_iter().collect()
    }

    /// Number of idle sessions.
    pub fn idle_count(&self) -> usize {
        self.inner.lock().idle.len()
    }

    /// Number of sessions currently checked out.
    pub fn checked_out_count(&self) -> usize {
        self.inner.lock().checked_out.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_acquire_reuses_the_same_session() {
        let pool = ServerSessionPool::new(Duration::from_secs(60));
        let session = pool.acquire();
        let id = session.id();
        pool.release(session).expect("release");

        let again = pool.acquire();
        assert_eq!(again.id(), id);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn reuse_is_lifo() {
        let pool = ServerSessionPool::new(Duration::from_secs(60));
        let first = pool.acquire();
        let second = pool.acquire();
        let second_id = second.id();

        pool.release(first).expect("release first");
        pool.release(second).expect("release second");

        // `second` was released last, so it comes back first.
        assert_eq!(pool.acquire().id(), second_id);
    }

    #[test]
    fn stale_sessions_are_pruned_and_scheduled_for_termination() {
        let pool = ServerSessionPool::new(Duration::from_millis(10));
        let session = pool.acquire();
        let stale_id = session.id();
        pool.release(session).expect("release");

        std::thread::sleep(Duration::from_millis(20));

        let fresh = pool.acquire();
        assert_ne!(fresh.id(), stale_id);
        assert_eq!(pool.idle_count(), 0);

        pool.release(fresh).expect("release fresh");
        let batch = pool.end_all();
        assert!(batch.contains(&stale_id));
    }

    #[test]
    fn dirty_sessions_never_rejoin_the_pool() {
        let pool = ServerSessionPool::new(Duration::from_secs(60));
        let mut session = pool.acquire();
        let dirty_id = session.id();
        session.dirty = true;
        pool.release(session).expect("release");

        assert_eq!(pool.idle_count(), 0);
        assert_ne!(pool.acquire().id(), dirty_id);
        assert!(pool.end_all().contains(&dirty_id));
    }

    #[test]
    fn releasing_a_session_twice_is_an_invalid_state() {
        let pool = ServerSessionPool::new(Duration::from_secs(60));
        let session = pool.acquire();
        let duplicate = ServerSession {
            id: session.id(),
            last_used_at: session.last_used_at,
            dirty: false,
            ended: false,
        };
        pool.release(session).expect("first release");

        let err = pool.release(duplicate).expect_err("second release fails");
        assert!(err.is_invalid_session_state());
    }

    #[test]
    fn end_all_drains_idle_and_checked_out() {
        let pool = ServerSessionPool::new(Duration::from_secs(60));
        let held = pool.acquire();
        let pooled = pool.acquire();
        let pooled_id = pooled.id();
        pool.release(pooled).expect("release");

        let ids = pool.end_all();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&held.id()));
        assert!(ids.contains(&pooled_id));
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.checked_out_count(), 0);
    }

    #[test]
    fn end_all_is_idempotent() {
        let pool = ServerSessionPool::new(Duration::from_secs(60));
        let session = pool.acquire();
        pool.release(session).expect("release");

        assert_eq!(pool.end_all().len(), 1);
        assert!(pool.end_all().is_empty());
    }

    #[test]
    fn release_after_close_is_silently_dropped() {
        let pool = ServerSessionPool::new(Duration::from_secs(60));
        let session = pool.acquire();
        let _ = pool.end_all();

        pool.release(session).expect("late release is a no-op");
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn release_after_close_clears_checked_out_bookkeeping() {
        let pool = ServerSessionPool::new(Duration::from_secs(60));
        let _ = pool.end_all();

        // Acquire stays infallible on a closed pool, so the checked-out
        // count must still return to zero on release.
        let session = pool.acquire();
        assert_eq!(pool.checked_out_count(), 1);

        pool.release(session).expect("release");
        assert_eq!(pool.checked_out_count(), 0);
        assert_eq!(pool.idle_count(), 0);
    }
}
