use std::{fmt, future::Future};

use crate::{
    backoff::wait_retry_backoff, Context, Error, Request, Response, Result, RetryPolicy,
    Transport,
};

/// Bytes read from a discarded response before its connection is dropped instead.
const DRAIN_LIMIT: usize = 64 * 1024;

/// Transport decorator that transparently retries requests.
///
/// By default safe and idempotent requests are attempted up to 3 times with a
/// linear delay of 100ms. Requests marked with [`crate::enable`] are always
/// considered. Requests without a body provider are sent once.
///
/// # Example
///
/// ```no_run
/// use http_retry::{Request, RetryPolicy, RetryTransport, Transport};
///
/// # async fn run() -> http_retry::Result<()> {
/// let transport = RetryTransport::new(reqwest::Client::new(), RetryPolicy::default());
/// let response = transport.invoke(Request::get("https://example.com/")?).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> fmt::Debug for RetryTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn round_trip(&self, request: Request) -> Result<Response> {
        if !self.policy.should_consider_retry(&request) {
            return self.inner.invoke(request).await;
        }
        let max_retry = self.policy.max_retry();
        if max_retry == 0 || !request.is_replayable() {
            return self.inner.invoke(request).await;
        }

        let context = request.context().clone();
        let mut last_err = None;
        let mut last_response = None;

        for attempt in 0..max_retry {
            let this_request = request
                .replay()
                .map_err(|source| Error::BodyReplay { attempt, source })?;
            wait_retry_backoff(attempt, &context, &self.policy).await?;

            match self.inner.invoke(this_request).await {
                Ok(response) => {
                    if !self.policy.should_discard(&response) {
                        return Ok(response);
                    }
                    if attempt + 1 < max_retry {
                        drain(response, &context).await?;
                    } else {
                        last_response = Some(response);
                    }
                }
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, error = %err, "request attempt failed");
                    last_err = Some(err);
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(attempts = max_retry, "retry budget spent");

        match (last_response, last_err) {
            (Some(response), _) => Ok(response),
            (None, Some(err)) => Err(err),
            (None, None) => Err(Error::BudgetExhausted),
        }
    }
}

impl<T: Transport> Transport for RetryTransport<T> {
    fn invoke(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        self.round_trip(request)
    }
}

/// Reads a discarded response so its connection can be reused.
///
/// Stops after [`DRAIN_LIMIT`] bytes and drops the response, closing the
/// connection. Fails with [`Error::Cancelled`] if `context` finishes first.
async fn drain(mut response: Response, context: &Context) -> Result<()> {
    let status = response.status();
    let mut drained = 0usize;
    loop {
        let chunk = tokio::select! {
            biased;
            reason = context.done() => return Err(Error::Cancelled(reason)),
            chunk = response.chunk() => chunk,
        };
        match chunk {
            Ok(Some(bytes)) => {
                drained += bytes.len();
                if drained > DRAIN_LIMIT {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(%status, drained, "discarded response too large, closing");
                    break;
                }
            }
            Ok(None) => break,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%status, error = %_err, "failed to drain discarded response");
                break;
            }
        }
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(%status, drained, "discarded response");
    #[cfg(not(feature = "tracing"))]
    let _ = status;
    Ok(())
}
