//! Bundled rss2json-format responses for development and offline fallback.

use thiserror::Error;

use super::rss2json::{non_empty, Rss2JsonResponse};
use super::types::{parse_pub_date, FeedSource, NewsItem};

const MOCK_RESPONSES: [(&str, &str); 3] = [
    (
        "https://feeds.bbci.co.uk/news/rss.xml",
        include_str!("fixtures/bbc-news.json"),
    ),
    (
        "https://www.theguardian.com/international/rss",
        include_str!("fixtures/the-guardian.json"),
    ),
    (
        "https://www.aljazeera.com/xml/rss/all.xml",
        include_str!("fixtures/al-jazeera.json"),
    ),
];

#[derive(Debug, Error)]
pub enum MockError {
    #[error("No mock response available for: {0}")]
    NotFound(String),
    #[error("Malformed mock response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Whether a bundled response exists for `url`.
///
/// # Arguments
///
/// * `url` - Feed URL, compared exactly (scheme included)
///
/// # Examples
///
/// ```
/// use newsdesk::feed::mock::has_mock_for;
///
/// assert!(has_mock_for("https://feeds.bbci.co.uk/news/rss.xml"));
/// assert!(!has_mock_for("http://feeds.bbci.co.uk/news/rss.xml"));
/// ```
pub fn has_mock_for(url: &str) -> bool {
    MOCK_RESPONSES.iter().any(|(mock_url, _)| *mock_url == url)
}

/// Feed URLs that have bundled responses.
pub fn available_mocks() -> Vec<&'static str> {
    MOCK_RESPONSES.iter().map(|(url, _)| *url).collect()
}

/// Parses the bundled response for `url`.
///
/// # Arguments
///
/// * `url` - Feed URL with a bundled response (see [`available_mocks`])
///
/// # Errors
///
/// - `MockError::NotFound` if no response is bundled for `url`
/// - `MockError::Malformed` if the bundled JSON does not parse
pub fn get_mock_response(url: &str) -> Result<Rss2JsonResponse, MockError> {
    let (_, body) = MOCK_RESPONSES
        .iter()
        .find(|(mock_url, _)| *mock_url == url)
        .ok_or_else(|| MockError::NotFound(url.to_string()))?;
    tracing::debug!(url, "Using mock data");
    Ok(serde_json::from_str(body)?)
}

/// Converts a bundled response into items labelled with `feed_name`.
///
/// # Arguments
///
/// * `response` - A parsed rss2json-format response
/// * `feed_name` - Display name stored as each item's `source_name`
///
/// Unlike the live adapter, descriptions are used verbatim (falling back to
/// the item content) and the source URL comes from the response itself.
pub fn convert_mock_to_items(response: &Rss2JsonResponse, feed_name: &str) -> Vec<NewsItem> {
    let source = response
        .feed
        .as_ref()
        .map(|f| f.url.clone())
        .unwrap_or_default();

    response
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| NewsItem {
            title: non_empty(item.title.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Article {}", index + 1)),
            link: item.link.clone().unwrap_or_default(),
            description: non_empty(item.description.as_deref())
                .or_else(|| non_empty(item.content.as_deref()))
                .unwrap_or_default()
                .to_string(),
            pub_date: parse_pub_date(item.pub_date.as_deref()),
            author: non_empty(item.author.as_deref()).map(str::to_string),
            source: source.clone(),
            source_name: feed_name.to_string(),
            image: non_empty(item.thumbnail.as_deref())
                .or_else(|| {
                    item.enclosure
                        .as_ref()
                        .and_then(|e| non_empty(e.thumbnail.as_deref()))
                })
                .map(str::to_string),
            categories: item.categories.clone(),
        })
        .collect()
}

/// Mock-strategy fetch for one feed. Feeds without a mock yield nothing.
///
/// # Returns
///
/// The feed's bundled items, or an empty list when no response is bundled
/// or the bundled JSON is malformed (logged at `warn`).
pub fn fetch_mock_feed(feed: &FeedSource) -> Vec<NewsItem> {
    if !has_mock_for(&feed.url) {
        tracing::warn!(feed = %feed.name, "No mock available, returning no items");
        return Vec::new();
    }

    match get_mock_response(&feed.url) {
        Ok(response) => convert_mock_to_items(&response, &feed.name),
        Err(e) => {
            tracing::error!(feed = %feed.name, error = %e, "Failed to load mock data");
            Vec::new()
        }
    }
}
