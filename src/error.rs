use std::fmt;

/// Boxed error used for transport failures and body provider failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a call-scoped [`Context`](crate::Context) stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CancelReason {
    /// The cancellation token was triggered.
    Canceled,
    /// The context deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Canceled => f.write_str("context canceled"),
            CancelReason::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

impl std::error::Error for CancelReason {}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request's body provider failed to produce a fresh body.
    #[error("failed reading body for retry attempt {attempt}: {source}")]
    BodyReplay {
        /// Zero-based attempt that needed the body.
        attempt: u32,
        #[source]
        source: BoxError,
    },
    /// The caller's context was cancelled or its deadline passed.
    #[error(transparent)]
    Cancelled(#[from] CancelReason),
    /// Network or request execution error from the underlying transport.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// No attempt produced an outcome.
    #[error("maximum retry budget reached")]
    BudgetExhausted,
    /// Request URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Request body could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

impl Error {
    /// Wraps any error as a transport failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Error::Transport(err.into())
    }

    /// Returns `true` for cancellation and deadline errors, which are never retried.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Returns the cancellation reason, if this is a cancellation error.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Error::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}
