use std::time::Duration;

use http_retry::{
    discard_retryable_status, logging, Context, Request, RetryOptions, RetryPolicy,
    RetryTransport, Transport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = std::env::var("HTTP_RETRY_URL")?;
    let options = RetryOptions::from_env().map_err(anyhow::Error::msg)?;
    let policy = RetryPolicy::from(options).with_discarder(discard_retryable_status);
    let transport = RetryTransport::new(reqwest::Client::new(), policy);

    let context = Context::new()
        .with_timeout(Duration::from_secs(10))
        .with_span(tracing::info_span!("fetch", %url));
    let request = Request::get(&url)?.with_context(context);

    let span = logging::extract_from_request(&request);
    let response = transport.invoke(request).await?;
    span.in_scope(|| tracing::info!(status = %response.status(), "request finished"));

    println!("{}", response.text().await?);
    Ok(())
}
