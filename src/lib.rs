//! `http-retry` is a client-side HTTP retry decorator.
//!
//! [`RetryTransport`] wraps any [`Transport`] (including `reqwest::Client`)
//! and transparently re-issues requests according to a [`RetryPolicy`]:
//! - bounded by a maximum number of attempts
//! - with a back-off delay before each retry
//! - honoring the caller's cancellation and deadline carried in [`Context`]
//!
//! Only requests whose body can be re-obtained are retried, see
//! [`Request::is_replayable`].

mod backoff;
mod context;
mod error;
mod options;
mod policy;
mod request;
mod retry;
mod transport;

#[cfg(feature = "tracing")]
pub mod logging;

pub use context::Context;
pub use error::{BoxError, CancelReason, Error};
pub use options::RetryOptions;
pub use policy::{
    backoff_exponential, backoff_linear, default_decider, discard_retryable_status,
    discard_status, is_idempotent, Backoff, Decider, Discarder, RetryPolicy, RETRYABLE_STATUSES,
};
pub use request::{enable, BodyProvider, Request};
pub use retry::RetryTransport;
pub use transport::{transport_fn, Transport, TransportFn};

pub use reqwest::Response;

pub type Result<T> = std::result::Result<T, Error>;
