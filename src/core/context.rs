//! Cancellable, time-boundable run context
//!
//! A `RunContext` is threaded through every external call and every wait in
//! the coordinator. It resolves once its token is cancelled or its deadline
//! passes, whichever comes first.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::errors::PmlError;

#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    /// A context that only ends when cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the context to `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Bound the context to an absolute deadline; an earlier existing deadline wins
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Derive a context that is cancelled with this one but can be cancelled on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The reason this context ended, if it has
    pub fn err(&self) -> Option<PmlError> {
        if self.token.is_cancelled() {
            return Some(PmlError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(PmlError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context ends
    pub async fn done(&self) -> PmlError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => PmlError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => PmlError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                PmlError::Cancelled
            }
        }
    }
}
