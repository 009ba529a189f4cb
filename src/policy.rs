use std::{fmt, sync::Arc, time::Duration};

use reqwest::{Method, StatusCode};

use crate::{Request, Response};

/// Maps a zero-based attempt index to the wait before that attempt.
pub type Backoff = Arc<dyn Fn(u32) -> Duration + Send + Sync>;
/// Decides whether a request is eligible for retries at all.
pub type Decider = Arc<dyn Fn(&Request) -> bool + Send + Sync>;
/// Decides whether an otherwise successful response should be retried.
pub type Discarder = Arc<dyn Fn(&Response) -> bool + Send + Sync>;

const DEFAULT_MAX_RETRY: u32 = 3;
const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(100);

/// Status codes worth another attempt: throttling and transient upstream failures.
pub const RETRYABLE_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Immutable retry configuration shared by every call through a
/// [`RetryTransport`](crate::RetryTransport).
///
/// By default requests with safe or idempotent methods are attempted up to
/// 3 times with a linear back-off of 100ms per attempt, and no response is
/// ever discarded.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retry: u32,
    backoff: Backoff,
    decider: Decider,
    discarder: Discarder,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY,
            backoff: Arc::new(backoff_linear(DEFAULT_BACKOFF_STEP)),
            decider: Arc::new(default_decider),
            discarder: Arc::new(|_: &Response| false),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retry", &self.max_retry)
            .field("backoff", &"<fn>")
            .field("decider", &"<fn>")
            .field("discarder", &"<fn>")
            .finish()
    }
}

impl RetryPolicy {
    /// Sets the maximum number of attempts, including the first one.
    ///
    /// Zero disables retries: every request is passed through once.
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn with_backoff<F>(mut self, backoff: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.backoff = Arc::new(backoff);
        self
    }

    pub fn with_decider<F>(mut self, decider: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.decider = Arc::new(decider);
        self
    }

    pub fn with_discarder<F>(mut self, discarder: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        self.discarder = Arc::new(discarder);
        self
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    /// Wait before `attempt`. Always zero for the first attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        (self.backoff)(attempt)
    }

    /// Returns `true` if the decider accepts the request or its context
    /// carries the force-retry flag.
    pub fn should_consider_retry(&self, request: &Request) -> bool {
        (self.decider)(request) || request.context().retry_enabled()
    }

    pub fn should_discard(&self, response: &Response) -> bool {
        (self.discarder)(response)
    }
}

/// Linear back-off: `step * attempt`.
pub fn backoff_linear(step: Duration) -> impl Fn(u32) -> Duration + Send + Sync + Clone {
    move |attempt: u32| step.saturating_mul(attempt)
}

/// Exponential back-off: `base * 2^(attempt - 1)`, capped at `max`.
pub fn backoff_exponential(
    base: Duration,
    max: Duration,
) -> impl Fn(u32) -> Duration + Send + Sync + Clone {
    move |attempt: u32| {
        let exp = attempt.saturating_sub(1).min(16);
        base.saturating_mul(1u32 << exp).min(max)
    }
}

/// Safe and idempotent methods per RFC 9110.
pub fn is_idempotent(method: &Method) -> bool {
    [
        Method::GET,
        Method::HEAD,
        Method::OPTIONS,
        Method::TRACE,
        Method::PUT,
        Method::DELETE,
    ]
    .contains(method)
}

/// Default decider: only safe and idempotent requests are retried.
pub fn default_decider(request: &Request) -> bool {
    is_idempotent(request.method())
}

/// Discards responses whose status is one of `statuses`.
pub fn discard_status(
    statuses: impl IntoIterator<Item = StatusCode>,
) -> impl Fn(&Response) -> bool + Send + Sync + Clone {
    let statuses: Arc<[StatusCode]> = statuses.into_iter().collect();
    move |response: &Response| statuses.contains(&response.status())
}

/// Discards throttling and transient upstream failure responses.
pub fn discard_retryable_status(response: &Response) -> bool {
    RETRYABLE_STATUSES.contains(&response.status())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::{Method, StatusCode};

    use super::*;

    fn response(status: u16) -> Response {
        Response::from(
            http::Response::builder()
                .status(status)
                .body("")
                .expect("response must build"),
        )
    }

    fn request(method: Method) -> Request {
        Request::new(method, "http://localhost/".parse().expect("url must parse"))
    }

    #[test]
    fn default_backoff_is_linear_and_zero_first() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retry(), 3);
        assert_eq!(policy.backoff_for(0), Duration::ZERO);
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(7), Duration::from_millis(700));
    }

    #[test]
    fn first_attempt_ignores_custom_backoff() {
        let policy = RetryPolicy::default().with_backoff(|_| Duration::from_secs(5));
        assert_eq!(policy.backoff_for(0), Duration::ZERO);
        assert_eq!(policy.backoff_for(1), Duration::from_secs(5));
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let backoff = backoff_exponential(Duration::from_millis(250), Duration::from_secs(2));
        assert_eq!(backoff(1), Duration::from_millis(250));
        assert_eq!(backoff(2), Duration::from_millis(500));
        assert_eq!(backoff(3), Duration::from_secs(1));
        assert_eq!(backoff(10), Duration::from_secs(2));
    }

    #[test]
    fn default_decider_accepts_idempotent_methods_only() {
        let policy = RetryPolicy::default();
        for method in [Method::GET, Method::HEAD, Method::OPTIONS, Method::PUT, Method::DELETE] {
            assert!(policy.should_consider_retry(&request(method)));
        }
        assert!(!policy.should_consider_retry(&request(Method::POST)));
        assert!(!policy.should_consider_retry(&request(Method::PATCH)));
    }

    #[test]
    fn override_flag_beats_decider() {
        let policy = RetryPolicy::default().with_decider(|_| false);
        assert!(!policy.should_consider_retry(&request(Method::GET)));
        assert!(policy.should_consider_retry(&request(Method::POST).enable_retry()));
    }

    #[test]
    fn default_never_discards() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_discard(&response(200)));
        assert!(!policy.should_discard(&response(503)));
    }

    #[test]
    fn status_discarders() {
        let policy = RetryPolicy::default().with_discarder(discard_status([StatusCode::CONFLICT]));
        assert!(policy.should_discard(&response(409)));
        assert!(!policy.should_discard(&response(503)));

        assert!(discard_retryable_status(&response(429)));
        assert!(discard_retryable_status(&response(504)));
        assert!(!discard_retryable_status(&response(404)));
    }

    #[test]
    fn debug_hides_closures() {
        let debug = format!("{:?}", RetryPolicy::default());
        assert!(debug.contains("max_retry: 3"));
        assert!(debug.contains("<fn>"));
    }
}
