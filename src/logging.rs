//! Access to the call-scoped span carried by a [`Context`].
//!
//! Enabled with the `tracing` feature.

use tracing::Span;

use crate::{Context, Request};

/// Returns the span previously attached with [`Context::with_span`].
///
/// If the context was never decorated, a disabled span is returned, so the
/// result is always safe to enter or record into.
pub fn extract(context: &Context) -> Span {
    context.span().cloned().unwrap_or_else(Span::none)
}

/// Returns the call-scoped span of `request`, see [`extract`].
pub fn extract_from_request(request: &Request) -> Span {
    extract(request.context())
}
