//! Production fetch path through the rss2json conversion API.
//!
//! Each feed is requested as `GET {base_url}?rss_url=<feed url>` and the JSON
//! reply is adapted into [`NewsItem`]s. Failed requests are retried with
//! exponential backoff; once every attempt has failed the feed falls back to
//! bundled mock data, or to the sample articles when no mock exists.

use std::sync::LazyLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use url::Url;

use super::types::{parse_pub_date, FeedSource, NewsItem};
use super::{mock, sample};
use crate::config::Rss2JsonConfig;
use crate::http::{read_limited_bytes, BodyError, RetryPolicy};
use crate::util::{strip_html, truncate_chars};

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024;
const DESCRIPTION_LIMIT: usize = 200;
const FALLBACK_SAMPLE_COUNT: usize = 5;

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src\s*=\s*['"]+([^'"]*)['"]+[^>]*>"#).unwrap()
});
static IMAGE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|svg)(\?|$)").unwrap());

#[derive(Debug, Error)]
pub enum Rss2JsonError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Rate limited")]
    RateLimited,
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Failed to read response: {0}")]
    Body(#[from] BodyError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RSS2JSON returned status: {0}")]
    UnexpectedStatus(String),
    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

// ============================================================================
// Response Types
// ============================================================================

/// Top-level rss2json reply. The bundled mock fixtures share this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Rss2JsonResponse {
    pub status: String,
    #[serde(default)]
    pub feed: Option<Rss2JsonFeed>,
    #[serde(default)]
    pub items: Vec<Rss2JsonItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Rss2JsonFeed {
    pub url: String,
    pub title: String,
    pub link: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Rss2JsonItem {
    pub title: Option<String>,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    #[serde(deserialize_with = "lenient_enclosure")]
    pub enclosure: Option<Enclosure>,
    #[serde(deserialize_with = "lenient_strings")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Enclosure {
    pub link: Option<String>,
    pub thumbnail: Option<String>,
}

// rss2json emits `{}` or `[]` for items without an enclosure
fn lenient_enclosure<'de, D>(deserializer: D) -> Result<Option<Enclosure>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Treats empty strings like missing values.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

// ============================================================================
// Client
// ============================================================================

/// Client for the rss2json API.
pub struct Rss2JsonClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    retry: RetryPolicy,
}

impl Rss2JsonClient {
    pub fn new(client: reqwest::Client, config: &Rss2JsonConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().map(SecretString::from),
            retry,
        }
    }

    /// Fetches one feed, retrying with backoff and falling back to mock or
    /// sample data. Never fails.
    pub async fn fetch_feed(&self, feed: &FeedSource) -> Vec<NewsItem> {
        let max_attempts = self.retry.max_attempts;

        for attempt in 1..=max_attempts {
            tracing::info!(feed = %feed.name, attempt, max_attempts, "Fetching feed");

            match self.fetch_feed_once(feed).await {
                Ok(items) => {
                    tracing::info!(feed = %feed.name, count = items.len(), "Loaded feed items");
                    return items;
                }
                Err(Rss2JsonError::RateLimited) => {
                    tracing::warn!(feed = %feed.name, attempt, max_attempts, "Rate limited");
                }
                Err(e) => {
                    tracing::warn!(
                        feed = %feed.name,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Failed to fetch feed"
                    );
                }
            }

            if attempt < max_attempts {
                let wait = self.retry.delay_after(attempt);
                tracing::info!(
                    feed = %feed.name,
                    wait_ms = wait.as_millis() as u64,
                    "Waiting before retry"
                );
                tokio::time::sleep(wait).await;
            }
        }

        tracing::error!(feed = %feed.name, max_attempts, "All attempts failed");
        fallback_items(feed)
    }

    /// A single request with no retry or fallback.
    pub async fn fetch_feed_once(&self, feed: &FeedSource) -> Result<Vec<NewsItem>, Rss2JsonError> {
        let mut params = vec![("rss_url", feed.url.as_str())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.expose_secret()));
        }
        let url = Url::parse_with_params(&self.base_url, &params)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Rss2JsonError::RateLimited);
        }
        if !status.is_success() {
            return Err(Rss2JsonError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        let data: Rss2JsonResponse = serde_json::from_slice(&bytes)?;

        if data.status == "ok" && !data.items.is_empty() {
            Ok(adapt_items(&data.items, feed))
        } else {
            Err(Rss2JsonError::UnexpectedStatus(data.status))
        }
    }
}

/// Data served for a feed whose live fetch failed: its mock if one is
/// bundled, otherwise the first five sample articles.
pub fn fallback_items(feed: &FeedSource) -> Vec<NewsItem> {
    if mock::has_mock_for(&feed.url) {
        match mock::get_mock_response(&feed.url) {
            Ok(response) => {
                tracing::info!(feed = %feed.name, "Using mock data as fallback");
                return mock::convert_mock_to_items(&response, &feed.name);
            }
            Err(e) => {
                tracing::error!(feed = %feed.name, error = %e, "Failed to load mock fallback");
            }
        }
    }

    tracing::info!(feed = %feed.name, "Using sample data as fallback");
    let mut items = sample::sample_items();
    items.truncate(FALLBACK_SAMPLE_COUNT);
    items
}

/// Maps rss2json items onto [`NewsItem`]s for `feed`.
pub fn adapt_items(items: &[Rss2JsonItem], feed: &FeedSource) -> Vec<NewsItem> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| NewsItem {
            title: non_empty(item.title.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Article {}", index + 1)),
            link: item.link.clone().unwrap_or_default(),
            description: summarize(item.description.as_deref().unwrap_or_default()),
            pub_date: parse_pub_date(item.pub_date.as_deref()),
            author: non_empty(item.author.as_deref()).map(str::to_string),
            source: feed.url.clone(),
            source_name: feed.name.clone(),
            image: extract_image(item),
            categories: item.categories.clone(),
        })
        .collect()
}

fn summarize(html: &str) -> String {
    truncate_chars(&strip_html(html), DESCRIPTION_LIMIT).into_owned()
}

/// Picks an item image: thumbnail, then enclosure link, then the first
/// `<img>` in the description that points at an image file.
pub fn extract_image(item: &Rss2JsonItem) -> Option<String> {
    if let Some(thumbnail) = non_empty(item.thumbnail.as_deref()) {
        return Some(thumbnail.to_string());
    }
    if let Some(link) = item
        .enclosure
        .as_ref()
        .and_then(|e| non_empty(e.link.as_deref()))
    {
        return Some(link.to_string());
    }

    let description = non_empty(item.description.as_deref())?;
    let src = IMG_SRC.captures(description)?.get(1)?.as_str();
    if IMAGE_EXTENSION.is_match(src) {
        Some(src.to_string())
    } else {
        None
    }
}
