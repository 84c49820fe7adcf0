//! Direct fetch path: download the feed XML itself and parse it locally.

use std::time::Duration;

use thiserror::Error;

use super::parser::parse_feed;
use super::types::{FeedSource, NewsItem};
use crate::http::{read_limited_bytes, BodyError, RetryPolicy};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while fetching a feed directly.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server kept answering 429 Too Many Requests
    #[error("Rate limited after {0} attempts")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl From<BodyError> for FetchError {
    fn from(e: BodyError) -> Self {
        match e {
            BodyError::Network(e) => FetchError::Network(e),
            BodyError::TooLarge => FetchError::ResponseTooLarge,
            BodyError::Incomplete { expected, received } => {
                FetchError::IncompleteResponse { expected, received }
            }
        }
    }
}

/// Fetches and parses a single feed, logging and swallowing errors.
pub async fn fetch_direct(
    client: &reqwest::Client,
    feed: &FeedSource,
    retry: RetryPolicy,
) -> Vec<NewsItem> {
    match fetch_one(client, feed, retry).await {
        Ok(items) => {
            tracing::info!(feed = %feed.name, count = items.len(), "Loaded feed items");
            items
        }
        Err(e) => {
            tracing::warn!(feed = %feed.name, url = %feed.url, error = %e, "Feed fetch failed");
            Vec::new()
        }
    }
}

/// Fetches and parses a single feed.
///
/// 429 and 5xx responses and truncated bodies are retried with exponential
/// backoff up to `retry.max_attempts` attempts; other 4xx responses fail
/// immediately.
pub async fn fetch_one(
    client: &reqwest::Client,
    feed: &FeedSource,
    retry: RetryPolicy,
) -> Result<Vec<NewsItem>, FetchError> {
    let mut attempt = 1;

    let bytes = loop {
        let response = tokio::time::timeout(REQUEST_TIMEOUT, client.get(&feed.url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if attempt >= retry.max_attempts {
                return Err(FetchError::RateLimited(attempt));
            }
            let delay = retry.delay_after(attempt);
            tracing::warn!(
                feed = %feed.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
            continue;
        }

        if status.is_server_error() {
            if attempt >= retry.max_attempts {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }
            let delay = retry.delay_after(attempt);
            tracing::warn!(
                feed = %feed.url,
                status = %status,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Server error, retrying after delay"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        match read_limited_bytes(response, MAX_FEED_SIZE).await {
            Ok(bytes) => break bytes,
            Err(BodyError::Incomplete { expected, received }) => {
                if attempt >= retry.max_attempts {
                    return Err(FetchError::IncompleteResponse { expected, received });
                }
                let delay = retry.delay_after(attempt);
                tracing::debug!(
                    feed = %feed.url,
                    expected,
                    received,
                    attempt,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    };

    parse_feed(&bytes, feed).map_err(|e| FetchError::Parse(e.to_string()))
}
