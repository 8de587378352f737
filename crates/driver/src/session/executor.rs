//! Runs caller operations under a session, normalizing every way an
//! operation can finish into one [`Outcome`].
//!
//! An operation factory may return a deferred computation that later
//! succeeds or fails, return immediately with no deferred work at all, or
//! fault synchronously during invocation. All four shapes feed the same
//! adapter, and on every one of them the session-release step runs before
//! the caller is signalled: releasing an implicit session is RAII-backed
//! by [`ClientSession`]'s drop, so even cancellation of the executor
//! future mid-await cannot leak a checked-out session.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::{Error, Result};
use crate::session::ClientSession;
use crate::session::pool::ServerSessionPool;

/// What an operation factory produced: deferred work to await, or an
/// immediate result.
pub enum Operation<T> {
    /// A computation that settles later with a value or an error.
    Deferred(BoxFuture<'static, Result<T>>),
    /// An immediate return; `None` when the operation produced no value.
    Ready(Option<T>),
}

impl<T> Operation<T> {
    /// Wraps a future as a deferred operation.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Operation::Deferred(Box::pin(future))
    }

    /// An immediate return with no value.
    pub fn ready() -> Self {
        Operation::Ready(None)
    }

    /// An immediate return carrying a value.
    pub fn value(value: T) -> Self {
        Operation::Ready(Some(value))
    }
}

/// Normalized result of running an operation under a session.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation completed; `None` when it produced no value.
    Success(Option<T>),
    /// The operation failed. The error is the operation's own, passed
    /// through untouched.
    Failure(Error),
}

impl<T> Outcome<T> {
    /// True for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The error, if this is a failure.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Failure(error) => Some(error),
            Outcome::Success(_) => None,
        }
    }

    /// Converts into a plain `Result`.
    pub fn into_result(self) -> Result<Option<T>> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }
}

/// Callback-style receiver for an outcome, invoked exactly once with the
/// same outcome the executor returns.
pub type Completion<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

/// Runs `factory` under an explicit session (caller-owned) or an implicit
/// one acquired from `pool`.
///
/// The implicit session is back in the pool before `completion` runs and
/// before the outcome is returned. Explicit sessions are left untouched
/// for the caller to end; an already-ended explicit session yields an
/// immediate `InvalidSessionState` failure without touching the pool.
pub(crate) async fn run<T, F>(
    pool: &Arc<ServerSessionPool>,
    explicit: Option<&mut ClientSession>,
    factory: F,
    completion: Option<Completion<T>>,
) -> Outcome<T>
where
    F: FnOnce(&mut ClientSession) -> Result<Operation<T>>,
{
    let mut implicit_holder: Option<ClientSession> = None;
    let session: &mut ClientSession = match explicit {
        Some(session) => {
            if session.is_ended() {
                let outcome = Outcome::Failure(Error::InvalidSessionState(format!(
                    "session {} already ended",
                    session.id()
                )));
                return signal(outcome, completion);
            }
            session
        }
        None => implicit_holder.insert(ClientSession::implicit(pool)),
    };

    let outcome = invoke_and_capture(session, factory).await;

    session.touch();
    if !outcome.is_success() {
        session.mark_dirty();
    }

    // Session release happens here, before the caller learns the outcome.
    drop(implicit_holder);

    signal(outcome, completion)
}

/// The single adapter every operation shape feeds through.
async fn invoke_and_capture<T, F>(session: &mut ClientSession, factory: F) -> Outcome<T>
where
    F: FnOnce(&mut ClientSession) -> Result<Operation<T>>,
{
    match factory(session) {
        // Synchronous fault during invocation.
        Err(error) => Outcome::Failure(error),
        // Immediate return, no deferred computation.
        Ok(Operation::Ready(value)) => Outcome::Success(value),
        Ok(Operation::Deferred(operation)) => {
            session.begin_operation();
            let result = operation.await;
            session.finish_operation();
            match result {
                Ok(value) => Outcome::Success(Some(value)),
                Err(error) => Outcome::Failure(error),
            }
        }
    }
}

fn signal<T>(outcome: Outcome<T>, completion: Option<Completion<T>>) -> Outcome<T> {
    if let Some(completion) = completion {
        completion(&outcome);
    }
    outcome
}
