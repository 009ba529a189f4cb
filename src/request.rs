use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Body, Method, Url,
};

use crate::{error::BoxError, Context, Error, Result};

/// Produces a fresh, independent body for each transmission of a request.
pub type BodyProvider = Arc<dyn Fn() -> std::result::Result<Body, BoxError> + Send + Sync>;

/// Outbound HTTP request handed to a [`Transport`](crate::Transport).
///
/// A request can only be retried when it has a body provider. Buffered
/// bodies set through [`Request::bytes_body`] or [`Request::json`] install
/// one automatically; [`Request::body`] sends a one-shot body that cannot be
/// replayed.
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    body: Option<Body>,
    body_provider: Option<BodyProvider>,
    context: Context,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("replayable", &self.body_provider.is_some())
            .field("context", &self.context)
            .finish()
    }
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            timeout: None,
            body: None,
            body_provider: None,
            context: Context::new(),
        }
    }

    /// Parses `url` and creates a request with an empty, replayable body.
    pub fn parse(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        Ok(Self::new(method, url).bytes_body(Bytes::new()))
    }

    pub fn get(url: &str) -> Result<Self> {
        Self::parse(Method::GET, url)
    }

    pub fn post(url: &str) -> Result<Self> {
        Self::parse(Method::POST, url)
    }

    pub fn put(url: &str) -> Result<Self> {
        Self::parse(Method::PUT, url)
    }

    pub fn delete(url: &str) -> Result<Self> {
        Self::parse(Method::DELETE, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Per-attempt timeout enforced by the reqwest transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets a buffered body that can be re-sent on every attempt.
    pub fn bytes_body(mut self, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        self.body = Some(Body::from(bytes.clone()));
        self.body_provider = Some(Arc::new(move || Ok(Body::from(bytes.clone()))));
        self
    }

    /// Serializes `value` as a JSON body and sets the content type.
    pub fn json<T: serde::Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value)
            .map_err(|err| Error::Encode(format!("invalid JSON request body: {err}")))?;
        Ok(self
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .bytes_body(encoded))
    }

    /// Sets a one-shot body. The request will not be retried.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self.body_provider = None;
        self
    }

    /// Installs a custom body provider, invoked once per attempt.
    pub fn body_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> std::result::Result<Body, BoxError> + Send + Sync + 'static,
    {
        self.body = None;
        self.body_provider = Some(Arc::new(provider));
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Forces retry eligibility for this request regardless of its method.
    pub fn enable_retry(mut self) -> Self {
        self.context = self.context.enable_retry();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns `true` when the body can be re-obtained for another attempt.
    pub fn is_replayable(&self) -> bool {
        self.body_provider.is_some()
    }

    /// Copies this request for one attempt, with a fresh body from the provider.
    ///
    /// The copy keeps the provider so nested retry layers can replay it again.
    /// Without a provider the copy has no body; check
    /// [`Request::is_replayable`] first.
    pub fn replay(&self) -> std::result::Result<Self, BoxError> {
        let body = match &self.body_provider {
            Some(provider) => Some(provider()?),
            None => None,
        };
        Ok(Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            timeout: self.timeout,
            body,
            body_provider: self.body_provider.clone(),
            context: self.context.clone(),
        })
    }

    /// Converts into a `reqwest::Request`, returning the context separately.
    pub fn into_reqwest(self) -> (reqwest::Request, Context) {
        let mut request = reqwest::Request::new(self.method, self.url);
        *request.headers_mut() = self.headers;
        *request.timeout_mut() = self.timeout;
        *request.body_mut() = self.body;
        (request, self.context)
    }
}

/// Marks `request` as retryable regardless of its method.
pub fn enable(request: Request) -> Request {
    request.enable_retry()
}
