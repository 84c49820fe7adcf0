use anyhow::Result;
use chrono::Utc;
use feed_rs::model::Entry;
use feed_rs::parser;

use super::types::{FeedSource, NewsItem};
use crate::util::{strip_html, truncate_chars};

const DESCRIPTION_LIMIT: usize = 200;

/// Parses RSS/Atom XML into items attributed to `feed`.
///
/// Entries missing a publication date are stamped with the parse time.
pub fn parse_feed(bytes: &[u8], feed: &FeedSource) -> Result<Vec<NewsItem>> {
    let parsed = parser::parse(bytes)?;
    let now = Utc::now();

    let items = parsed
        .entries
        .into_iter()
        .map(|entry| {
            let image = entry_image(&entry);
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();
            let pub_date = entry.published.or(entry.updated).unwrap_or(now);
            let author = entry
                .authors
                .first()
                .map(|a| a.name.trim().to_string())
                .filter(|name| !name.is_empty());
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|html| truncate_chars(&strip_html(&html), DESCRIPTION_LIMIT).into_owned())
                .unwrap_or_default();
            let title = entry
                .title
                .map(|t| strip_html(&t.content))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "No title".to_string());

            NewsItem {
                title,
                link,
                description,
                pub_date,
                author,
                source: feed.url.clone(),
                source_name: feed.name.clone(),
                image,
                categories: entry.categories.into_iter().map(|c| c.term).collect(),
            }
        })
        .collect();

    Ok(items)
}

/// First media thumbnail, else the first image-typed media content
/// (RSS enclosures land there too).
fn entry_image(entry: &Entry) -> Option<String> {
    let thumbnail = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.trim())
        .find(|uri| !uri.is_empty());
    if let Some(uri) = thumbnail {
        return Some(uri.to_string());
    }

    entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .find(|c| {
            c.content_type
                .as_ref()
                .is_some_and(|ct| ct.to_string().starts_with("image/"))
        })
        .and_then(|c| c.url.as_ref())
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn feed() -> FeedSource {
        FeedSource::new("Example", "https://example.com/rss", Some("News"))
    }

    #[test]
    fn test_parse_rss_items() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/"><channel>
  <title>Example</title>
  <item>
    <title>First &amp; foremost</title>
    <link>https://example.com/a</link>
    <description>&lt;p&gt;Body &lt;b&gt;text&lt;/b&gt;&lt;/p&gt;</description>
    <pubDate>Mon, 15 Jan 2024 10:30:00 GMT</pubDate>
    <author>editor@example.com (Jane Doe)</author>
    <category>World</category>
    <media:thumbnail url="https://example.com/a.jpg" width="240" height="135"/>
  </item>
  <item>
    <link>https://example.com/b</link>
    <enclosure url="https://example.com/b.png" type="image/png" length="100"/>
  </item>
</channel></rss>"#;

        let items = parse_feed(xml.as_bytes(), &feed()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title, "First & foremost");
        assert_eq!(first.link, "https://example.com/a");
        assert_eq!(first.description, "Body text");
        assert_eq!(
            first.pub_date,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
        );
        assert!(first.author.is_some());
        assert_eq!(first.categories, vec!["World".to_string()]);
        assert_eq!(first.image.as_deref(), Some("https://example.com/a.jpg"));
        assert_eq!(first.source, "https://example.com/rss");
        assert_eq!(first.source_name, "Example");

        let second = &items[1];
        assert_eq!(second.title, "No title");
        assert_eq!(second.image.as_deref(), Some("https://example.com/b.png"));
    }

    #[test]
    fn test_parse_atom_uses_updated_date() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <id>urn:feed</id>
  <updated>2024-02-01T00:00:00Z</updated>
  <entry>
    <title>Atom entry</title>
    <id>urn:entry:1</id>
    <link href="https://example.com/atom/1"/>
    <updated>2024-02-01T08:00:00Z</updated>
    <summary>Short</summary>
  </entry>
</feed>"#;

        let items = parse_feed(xml.as_bytes(), &feed()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://example.com/atom/1");
        assert_eq!(items[0].description, "Short");
        assert_eq!(
            items[0].pub_date,
            Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_malformed_feed_is_error() {
        assert!(parse_feed(b"<not valid xml", &feed()).is_err());
    }
}
