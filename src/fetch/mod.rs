//! Raw payload loading from a local directory or the upstream HTTP API.

mod client;
mod source;

pub use client::{BasicClient, HttpClient, REQUEST_TIMEOUT};
pub use source::Source;

use anyhow::{Context, Result};

/// GETs `url` and returns the body. Non-2xx statuses are errors.
#[tracing::instrument(skip(client))]
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid URL {url}"))?,
    );

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}
