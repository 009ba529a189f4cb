use std::{future::Future, sync::Arc};

use crate::{Error, Request, Response, Result};

/// Executes one outbound HTTP request.
///
/// Implementations may themselves wrap further transports, see
/// [`RetryTransport`](crate::RetryTransport).
pub trait Transport: Send + Sync {
    fn invoke(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl Transport for reqwest::Client {
    /// Sends the request, racing it against the request's context.
    ///
    /// A context that finishes mid-exchange yields [`Error::Cancelled`].
    fn invoke(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        let (request, context) = request.into_reqwest();
        async move {
            if let Some(reason) = context.err() {
                return Err(Error::Cancelled(reason));
            }
            tokio::select! {
                biased;
                reason = context.done() => Err(Error::Cancelled(reason)),
                response = self.execute(request) => response.map_err(Error::from),
            }
        }
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn invoke(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).invoke(request)
    }
}

/// Transport backed by a closure, see [`transport_fn`].
#[derive(Clone)]
pub struct TransportFn<F>(F);

/// Adapts an async closure into a [`Transport`].
pub fn transport_fn<F, Fut>(f: F) -> TransportFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    TransportFn(f)
}

impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    fn invoke(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (self.0)(request)
    }
}
