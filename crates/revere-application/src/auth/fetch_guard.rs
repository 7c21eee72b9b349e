//! Re-entrancy guard for the membership fetch.
//!
//! The guard is a small state machine keyed by user id:
//!
//! ```text
//! Idle ──try_begin──▶ Fetching(user) ──complete──▶ Loaded(user)
//!                          │  └─────────fail─────▶ Errored(user)
//!                          └── ticket dropped ──▶ Idle
//! ```
//!
//! `reset` returns to `Idle` from anywhere and bumps an epoch, so a ticket
//! issued before the reset can no longer write its outcome.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching { user_id: String },
    Loaded { user_id: String },
    Errored { user_id: String },
}

/// Why `try_begin` refused to start a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRefusal {
    /// Some fetch is already running.
    InFlight,
    /// This user has already been fetched (successfully or not).
    AlreadyFetched,
}

#[derive(Debug)]
struct GuardInner {
    state: FetchState,
    epoch: u64,
}

#[derive(Debug, Clone)]
pub struct FetchGuard {
    inner: Arc<Mutex<GuardInner>>,
}

fn lock(inner: &Mutex<GuardInner>) -> MutexGuard<'_, GuardInner> {
    // State stays consistent across a panic: every write is a single assignment.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FetchGuard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(GuardInner {
                state: FetchState::Idle,
                epoch: 0,
            })),
        }
    }

    pub fn state(&self) -> FetchState {
        lock(&self.inner).state.clone()
    }

    /// Starts a fetch for `user_id` unless one is running or this user was
    /// already fetched.
    pub fn try_begin(&self, user_id: &str) -> Result<FetchTicket, FetchRefusal> {
        let mut inner = lock(&self.inner);
        match &inner.state {
            FetchState::Fetching { .. } => return Err(FetchRefusal::InFlight),
            FetchState::Loaded { user_id: last } | FetchState::Errored { user_id: last }
                if last == user_id =>
            {
                return Err(FetchRefusal::AlreadyFetched);
            }
            _ => {}
        }

        inner.state = FetchState::Fetching {
            user_id: user_id.to_string(),
        };
        Ok(FetchTicket {
            inner: Arc::clone(&self.inner),
            epoch: inner.epoch,
            user_id: user_id.to_string(),
            finished: false,
        })
    }

    /// Forgets everything, including a fetch in flight.
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        inner.epoch += 1;
        inner.state = FetchState::Idle;
    }

    /// Forgets the last fetched user so the next `try_begin` runs again.
    ///
    /// A fetch in flight is left alone; returns false in that case.
    pub fn release_for_retry(&self) -> bool {
        let mut inner = lock(&self.inner);
        if matches!(inner.state, FetchState::Fetching { .. }) {
            return false;
        }
        inner.state = FetchState::Idle;
        true
    }
}

impl Default for FetchGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that a fetch is in flight. Dropping it without calling
/// [`complete`](Self::complete) or [`fail`](Self::fail) releases the guard.
#[derive(Debug)]
pub struct FetchTicket {
    inner: Arc<Mutex<GuardInner>>,
    epoch: u64,
    user_id: String,
    finished: bool,
}

impl FetchTicket {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn complete(mut self) {
        let user_id = self.user_id.clone();
        self.finish(FetchState::Loaded { user_id });
    }

    pub fn fail(mut self) {
        let user_id = self.user_id.clone();
        self.finish(FetchState::Errored { user_id });
    }

    fn finish(&mut self, next: FetchState) {
        self.finished = true;
        let mut inner = lock(&self.inner);
        if inner.epoch == self.epoch {
            inner.state = next;
        }
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(FetchState::Idle);
        }
    }
}
