use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named RSS source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, category: Option<&str>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            category: category.map(str::to_string),
        }
    }
}

/// A normalized article, whichever strategy produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    /// Article URL. May be empty when the feed supplied none.
    pub link: String,
    /// Plain-text summary.
    pub description: String,
    pub pub_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// URL of the feed the item came from.
    pub source: String,
    /// Display name of the feed.
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Feeds used when the config file names none.
pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("BBC News", "http://feeds.bbci.co.uk/news/rss.xml", Some("News")),
        FeedSource::new("TechCrunch", "https://techcrunch.com/feed/", Some("Technology")),
        FeedSource::new("Hacker News", "https://hnrss.org/frontpage", Some("Technology")),
        FeedSource::new(
            "The Guardian",
            "https://www.theguardian.com/international/rss",
            Some("News"),
        ),
        FeedSource::new("Dev.to", "https://dev.to/feed", Some("Development")),
    ]
}

/// Parses a feed-supplied publication date.
///
/// Accepts RFC 3339, RFC 2822 and the `YYYY-MM-DD HH:MM:SS` form rss2json
/// emits (taken as UTC). Returns `None` for anything else.
pub fn try_parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Like [`try_parse_pub_date`], but missing or unparseable dates become now.
pub fn parse_pub_date(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(try_parse_pub_date).unwrap_or_else(Utc::now)
}

/// Orders items newest first and drops repeated non-empty links, keeping
/// the first occurrence.
pub fn sort_and_dedup(mut items: Vec<NewsItem>) -> Vec<NewsItem> {
    items.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));

    let mut seen = std::collections::HashSet::new();
    items.retain(|item| item.link.is_empty() || seen.insert(item.link.clone()));
    items
}
