//! Execution context: cancellation and deadline propagation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Carries cancellation and an optional deadline through a call chain.
///
/// Cloning yields a handle to the same scope; [`Context::child`] and
/// [`Context::with_timeout`] derive a nested scope that is cancelled with its
/// parent but can also be cancelled on its own.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Creates a root context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a nested scope inheriting cancellation and deadline.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derives a nested scope whose deadline is at most `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a nested scope whose deadline is at most `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancels this scope and every scope derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once this scope has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The deadline of this scope, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The underlying cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the error this scope has already ended with, if any.
    pub fn err(&self) -> Option<Error> {
        if self.cancel.is_cancelled() {
            Some(Error::Cancelled)
        } else if self.deadline.is_some_and(|d| d <= Instant::now()) {
            Some(Error::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Error::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Error::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                Error::Cancelled
            }
        }
    }

    /// Drives `fut` until it completes or this scope ends, whichever is first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            res = fut => res,
        }
    }
}
