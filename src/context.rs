//! Per-call execution context.
//!
//! A [`Context`] travels alongside every request through the chain. It
//! carries the caller's deadline, a cancellation signal and a small bag of
//! string metadata (trace ids and the like). Interceptors never mutate a
//! context in place; they derive a new one and pass that to `next`:
//!
//! ```text
//! upstream ctx ──with_timeout(50ms)──▶ derived ctx ──▶ next.handle(&derived, …)
//!      │                                    │
//!      └──── cancels ───────────────────────▶ (child token)
//! ```
//!
//! Every derived context gets a child cancellation token: cancelling the
//! upstream context cancels it, cancelling it leaves upstream alone.
//!
//! Cloning is cheap: the token is reference counted and the baggage sits
//! behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::Error;

#[derive(Clone, Debug, Default)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
    baggage: Arc<HashMap<String, String>>,
}

impl Context {
    /// A root context: no deadline, a fresh cancellation signal, no baggage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a context that expires at `at`.
    ///
    /// A derived context can only tighten the deadline. If the current one
    /// is earlier it is kept.
    pub fn with_deadline(&self, at: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= at => current,
            _ => at,
        };
        Self { deadline: Some(deadline), ..self.child() }
    }

    /// Derives a context that expires `dur` from now.
    ///
    /// A `dur` too large to represent (`Duration::MAX` as "no limit") keeps
    /// the current deadline.
    pub fn with_timeout(&self, dur: Duration) -> Self {
        match Instant::now().checked_add(dur) {
            Some(at) => self.with_deadline(at),
            None => self.child(),
        }
    }

    /// Derives a context carrying one more baggage entry.
    pub fn with_baggage(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut baggage = (*self.baggage).clone();
        baggage.insert(key.into(), value.into());
        Self { baggage: Arc::new(baggage), ..self.child() }
    }

    pub fn baggage(&self, key: &str) -> Option<&str> {
        self.baggage.get(key).map(String::as_str)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `Some(ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Derives a context with its own cancellation scope and nothing else
    /// changed.
    ///
    /// Cancelling `self` cancels the child. Cancelling the child leaves
    /// `self` untouched.
    pub fn child(&self) -> Self {
        Self { token: self.token.child_token(), ..self.clone() }
    }

    /// Signals cancellation to this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels this context when the returned guard is dropped.
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(at) if Instant::now() >= at => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(at) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(at) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}
