//! Cancellable waits between attempts.

use tokio::time::sleep;

use crate::{Context, Error, Result, RetryPolicy};

/// Waits out the back-off before `attempt`, unless `context` finishes first.
///
/// The first attempt never waits, and a zero back-off never suspends. A
/// context that is already done wins over an elapsed timer.
pub(crate) async fn wait_retry_backoff(
    attempt: u32,
    context: &Context,
    policy: &RetryPolicy,
) -> Result<()> {
    let wait = policy.backoff_for(attempt);
    if wait.is_zero() {
        return Ok(());
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(attempt, ?wait, "waiting before retry");

    tokio::select! {
        biased;
        reason = context.done() => Err(Error::Cancelled(reason)),
        _ = sleep(wait) => Ok(()),
    }
}
