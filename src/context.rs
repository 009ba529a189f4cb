use std::{fmt, time::Duration};

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::CancelReason;

/// Call-scoped state travelling with a [`Request`](crate::Request).
///
/// Carries the caller's cancellation token, an optional deadline, the
/// force-retry flag and, with the `tracing` feature, a call-scoped span.
/// Cloning is cheap and clones share the same cancellation token.
#[derive(Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    retry_enabled: bool,
    #[cfg(feature = "tracing")]
    span: Option<tracing::Span>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .field("retry_enabled", &self.retry_enabled)
            .finish()
    }
}

impl Context {
    /// Creates a context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            retry_enabled: false,
            #[cfg(feature = "tracing")]
            span: None,
        }
    }

    /// Uses `token` as this context's cancellation signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Sets an absolute deadline, keeping the earlier one if already set.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets a deadline `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the deadline as is.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Marks the call as retryable regardless of the policy's decider.
    pub fn enable_retry(mut self) -> Self {
        self.retry_enabled = true;
        self
    }

    /// Attaches a call-scoped span, see [`crate::logging::extract`].
    #[cfg(feature = "tracing")]
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry_enabled
    }

    #[cfg(feature = "tracing")]
    pub(crate) fn span(&self) -> Option<&tracing::Span> {
        self.span.as_ref()
    }

    /// Returns the reason this context is done, or `None` while it is live.
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => CancelReason::Canceled,
                _ = time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Canceled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::Context;
    use crate::CancelReason;

    #[test]
    fn fresh_context_is_live() {
        let ctx = Context::new();
        assert_eq!(ctx.err(), None);
        assert!(!ctx.retry_enabled());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn clones_share_cancellation() {
        let token = CancellationToken::new();
        let ctx = Context::new().with_cancellation(token.clone());
        let clone = ctx.clone();

        token.cancel();

        assert_eq!(ctx.err(), Some(CancelReason::Canceled));
        assert_eq!(clone.err(), Some(CancelReason::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_deadline_wins() {
        let ctx = Context::new()
            .with_timeout(Duration::from_millis(50))
            .with_timeout(Duration::from_secs(10));

        let reason = ctx.done().await;

        assert_eq!(reason, CancelReason::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
    }

    #[tokio::test]
    async fn unrepresentable_timeout_leaves_deadline_unset() {
        let ctx = Context::new().with_timeout(Duration::MAX);
        assert!(ctx.deadline().is_none());
        assert_eq!(ctx.err(), None);

        let bounded = Context::new()
            .with_timeout(Duration::from_secs(5))
            .with_timeout(Duration::MAX);
        assert!(bounded.deadline().is_some());
    }

    #[tokio::test]
    async fn done_reports_cancellation_before_deadline() {
        let token = CancellationToken::new();
        let ctx = Context::new()
            .with_cancellation(token.clone())
            .with_timeout(Duration::from_secs(60));

        token.cancel();

        assert_eq!(ctx.done().await, CancelReason::Canceled);
    }
}
