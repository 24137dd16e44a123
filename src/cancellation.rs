//! Cancellation and deadline propagation for lifecycle calls.
//!
//! A [`Context`] travels with every health check and shutdown dispatched by
//! the injector. It carries a [`CancellationToken`] and an optional deadline;
//! deriving a context with a timeout keeps whichever deadline comes first.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Cancelling a token cancels every child token derived from it.
pub use tokio_util::sync::CancellationToken;

/// Why a [`Context`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The deadline passed
    DeadlineExceeded,
    /// The token was cancelled
    Canceled,
}

/// Cancellation signal plus optional deadline passed to lifecycle calls.
///
/// # Examples
///
/// ```
/// use ferrous_injector::Context;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let outer = Context::background().with_timeout(Duration::from_secs(1));
/// let inner = outer.with_timeout(Duration::from_secs(30));
///
/// // The earlier deadline wins
/// assert_eq!(inner.deadline(), outer.deadline());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a context whose deadline is at most `timeout` from now.
    ///
    /// A zero timeout means "no additional deadline".
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            return self.clone();
        }
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context whose deadline is the earlier of `deadline` and the current one.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    /// Derives a child context and the token that cancels it.
    pub fn with_cancel(&self) -> (Self, CancellationToken) {
        let token = self.token.child_token();
        let ctx = Self {
            token: token.clone(),
            deadline: self.deadline,
        };
        (ctx, token)
    }

    /// Deadline of this context, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancellation token of this context.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Completes when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => ContextError::Canceled,
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }

    /// Runs `fut` until it completes or the context is done, whichever is first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            output = fut => Ok(output),
            err = self.done() => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelling_parent_cancels_derived_contexts() {
        let (parent, token) = Context::background().with_cancel();
        let (child, _) = parent.with_cancel();
        let timed = child.with_timeout(Duration::from_secs(60));

        token.cancel();
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert_eq!(timed.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn test_cancelling_child_leaves_parent_live() {
        let (parent, _) = Context::background().with_cancel();
        let (child, token) = parent.with_cancel();

        token.cancel();
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert_eq!(parent.err(), None);
    }

    #[tokio::test]
    async fn test_done_wakes_on_cancel() {
        let (ctx, token) = Context::background().with_cancel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        assert_eq!(ctx.done().await, ContextError::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_earliest_deadline_wins() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let looser = ctx.with_timeout(Duration::from_secs(10));
        let tighter = ctx.with_timeout(Duration::from_millis(5));

        assert_eq!(looser.deadline(), ctx.deadline());
        assert!(tighter.deadline() < ctx.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(10));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(1)))
            .await;
        assert_eq!(result, Err(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_run_reports_cancellation() {
        let (ctx, token) = Context::background().with_cancel();
        token.cancel();
        let result = ctx.run(async { 1 }).await;
        assert_eq!(result, Err(ContextError::Canceled));
    }

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = Context::background().with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }
}
