//! Checkout context with cancellation and deadline support

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a checkout wait was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abort {
    /// The cancellation token fired.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

/// Context for a checkout.
///
/// Governs only the admission wait in [`Pool::get_with`](crate::Pool::get_with).
/// Once a handle is being dialed the factory call runs to completion, so a
/// factory that needs its own timeout must enforce it itself.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Cooperative cancellation token.
    pub cancellation: CancellationToken,
    /// Point in time after which the wait is abandoned.
    pub deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Replace the default cancellation token with the provided one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Abandon the wait at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Abandon the wait `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Report whether the context has already fired.
    ///
    /// Cancellation wins over an expired deadline.
    #[must_use]
    pub fn check(&self) -> Option<Abort> {
        if self.cancellation.is_cancelled() {
            return Some(Abort::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Abort::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the context fires.
    pub(crate) async fn done(&self) -> Abort {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    () = self.cancellation.cancelled() => Abort::Cancelled,
                    () = tokio::time::sleep_until(deadline) => Abort::DeadlineExceeded,
                }
            }
            None => {
                self.cancellation.cancelled().await;
                Abort::Cancelled
            }
        }
    }
}
