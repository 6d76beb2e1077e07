//! Wait context for lock acquisition.
//!
//! A [`WaitContext`] carries an optional deadline and a [`CancelToken`].
//! Retry loops block on the token's condition variable, so a cancellation
//! from another thread wakes a waiter immediately instead of after the
//! retry delay.

use crate::error::{FileError, Result};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Why a wait context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Done {
    Canceled,
    DeadlineExceeded,
}

impl Done {
    /// Generic translation, used where no file path is at stake.
    pub fn into_error(self) -> FileError {
        match self {
            Done::Canceled => FileError::Canceled,
            Done::DeadlineExceeded => FileError::ContextDone("deadline exceeded".to_string()),
        }
    }

    /// Translation used by lock retry loops: an expired deadline while
    /// waiting for `path` is a lock timeout.
    pub fn into_wait_error(self, path: &Path) -> FileError {
        match self {
            Done::Canceled => FileError::Canceled,
            Done::DeadlineExceeded => FileError::Timeout(path.to_path_buf()),
        }
    }
}

/// Cooperative cancellation signal shared between threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every context holding this token and wake their waiters.
    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        let mut canceled = flag.lock().unwrap_or_else(PoisonError::into_inner);
        *canceled = true;
        cvar.notify_all();
    }

    pub fn is_canceled(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until canceled or until `until`. Returns whether it was canceled.
    fn wait_until(&self, until: Instant) -> bool {
        let (flag, cvar) = &*self.inner;
        let mut canceled = flag.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *canceled {
                return true;
            }
            let now = Instant::now();
            if now >= until {
                return false;
            }
            let (guard, _) = cvar
                .wait_timeout(canceled, until - now)
                .unwrap_or_else(PoisonError::into_inner);
            canceled = guard;
        }
    }
}

/// Deadline and cancellation for blocking lock waits.
#[derive(Debug, Clone, Default)]
pub struct WaitContext {
    deadline: Option<Instant>,
    token: CancelToken,
}

impl WaitContext {
    /// A context that never expires and is never canceled.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancelToken::new(),
        }
    }

    /// Replace the cancellation token, e.g. to share one across contexts.
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `Some` once the context is canceled or past its deadline.
    pub fn done(&self) -> Option<Done> {
        if self.token.is_canceled() {
            return Some(Done::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Done::DeadlineExceeded),
            _ => None,
        }
    }

    /// Sleep for `delay`, racing cancellation and the deadline.
    ///
    /// Returns `Some` when the context finished before the delay elapsed.
    pub fn sleep(&self, delay: Duration) -> Option<Done> {
        let mut until = Instant::now() + delay;
        if let Some(deadline) = self.deadline
            && deadline < until
        {
            until = deadline;
        }
        if self.token.wait_until(until) {
            return Some(Done::Canceled);
        }
        self.done()
    }

    /// Run `attempt` until it succeeds or fails with a non-retryable error.
    ///
    /// The context is checked before every attempt, so a context that is
    /// already done never runs `attempt`. Lock contention waits `retry_delay`
    /// between attempts; an expired deadline surfaces as
    /// [`FileError::Timeout`] for `path`.
    pub fn retry<T, F>(&self, path: &Path, retry_delay: Duration, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        loop {
            if let Some(done) = self.done() {
                return Err(done.into_wait_error(path));
            }

            match attempt() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    tracing::trace!(path = %path.display(), error = %e, "lock contended, retrying");
                    if let Some(done) = self.sleep(retry_delay) {
                        return Err(done.into_wait_error(path));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
