use futures::stream::{self, StreamExt};
use serde::Deserialize;

use super::fetcher::fetch_direct;
use super::mock::fetch_mock_feed;
use super::rss2json::Rss2JsonClient;
use super::sample::sample_items;
use super::types::{sort_and_dedup, FeedSource, NewsItem};
use crate::config::Config;
use crate::http::RetryPolicy;

const MAX_CONCURRENT_FEEDS: usize = 10;

/// Which fetch path to use, as named in config and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Bundled mock responses only
    Mock,
    /// rss2json API with retry and fallback
    Live,
    /// Fetch and parse feed XML directly
    Direct,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StrategyKind::Mock => "mock",
            StrategyKind::Live => "live",
            StrategyKind::Direct => "direct",
        })
    }
}

/// A runtime-selected way of turning feed sources into articles.
pub enum FetchStrategy {
    Mock,
    Live(Rss2JsonClient),
    Direct {
        client: reqwest::Client,
        retry: RetryPolicy,
    },
}

impl FetchStrategy {
    pub fn new(kind: StrategyKind, client: reqwest::Client, config: &Config) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        match kind {
            StrategyKind::Mock => FetchStrategy::Mock,
            StrategyKind::Live => {
                FetchStrategy::Live(Rss2JsonClient::new(client, &config.rss2json, retry))
            }
            StrategyKind::Direct => FetchStrategy::Direct { client, retry },
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            FetchStrategy::Mock => StrategyKind::Mock,
            FetchStrategy::Live(_) => StrategyKind::Live,
            FetchStrategy::Direct { .. } => StrategyKind::Direct,
        }
    }

    async fn fetch_feed(&self, feed: &FeedSource) -> Vec<NewsItem> {
        match self {
            FetchStrategy::Mock => fetch_mock_feed(feed),
            FetchStrategy::Live(rss2json) => rss2json.fetch_feed(feed).await,
            FetchStrategy::Direct { client, retry } => fetch_direct(client, feed, *retry).await,
        }
    }

    /// Fetches every feed (at most 10 at a time) and merges the results
    /// newest first with duplicate links removed.
    ///
    /// A failing feed contributes nothing rather than failing the whole
    /// batch. The live strategy substitutes the sample articles when no feed
    /// produced anything.
    pub async fn fetch_multiple_feeds(&self, feeds: &[FeedSource]) -> Vec<NewsItem> {
        tracing::info!(strategy = %self.kind(), feeds = feeds.len(), "Fetching feeds");

        let batches: Vec<Vec<NewsItem>> = stream::iter(feeds)
            .map(|feed| self.fetch_feed(feed))
            .buffered(MAX_CONCURRENT_FEEDS)
            .collect()
            .await;
        let all_items: Vec<NewsItem> = batches.into_iter().flatten().collect();

        if all_items.is_empty() && self.kind() == StrategyKind::Live {
            tracing::info!("No live feeds available, showing sample data");
            return sample_items();
        }

        let items = sort_and_dedup(all_items);
        tracing::info!(count = items.len(), "Loaded articles");
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rss2JsonConfig;
    use crate::feed::sample::SAMPLE_SOURCE;
    use std::time::Duration;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(link, date)| {
                format!("<item><title>{link}</title><link>{link}</link><pubDate>{date}</pubDate></item>")
            })
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{body}</channel></rss>"#)
    }

    fn direct() -> FetchStrategy {
        FetchStrategy::Direct {
            client: reqwest::Client::new(),
            retry: RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
            },
        }
    }

    #[tokio::test]
    async fn test_mock_strategy_merges_and_sorts() {
        let feeds = vec![
            FeedSource::new("BBC News", "https://feeds.bbci.co.uk/news/rss.xml", None),
            FeedSource::new("Dev.to", "https://dev.to/feed", None),
            FeedSource::new("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml", None),
        ];
        let items = FetchStrategy::Mock.fetch_multiple_feeds(&feeds).await;

        assert_eq!(items.len(), 5);
        assert!(items.windows(2).all(|w| w[0].pub_date >= w[1].pub_date));
        assert_eq!(items[0].source_name, "Al Jazeera");
    }

    #[tokio::test]
    async fn test_direct_strategy_survives_failing_feed_and_dedups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[
                ("https://example.com/1", "Mon, 15 Jan 2024 10:00:00 GMT"),
                ("https://example.com/2", "Mon, 15 Jan 2024 12:00:00 GMT"),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[(
                "https://example.com/1",
                "Mon, 15 Jan 2024 09:00:00 GMT",
            )])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let feeds = vec![
            FeedSource::new("A", format!("{}/a", server.uri()), None),
            FeedSource::new("Broken", format!("{}/broken", server.uri()), None),
            FeedSource::new("B", format!("{}/b", server.uri()), None),
        ];
        let items = direct().fetch_multiple_feeds(&feeds).await;

        let links: Vec<&str> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links, ["https://example.com/2", "https://example.com/1"]);
        assert_eq!(items[1].source_name, "A");
    }

    #[tokio::test]
    async fn test_live_strategy_with_no_feeds_shows_samples() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let live = FetchStrategy::Live(Rss2JsonClient::new(
            reqwest::Client::new(),
            &Rss2JsonConfig {
                base_url: server.uri(),
                api_key: None,
            },
            RetryPolicy::default(),
        ));
        let items = live.fetch_multiple_feeds(&[]).await;
        assert_eq!(items.len(), 8);
        assert!(items.iter().all(|i| i.source == SAMPLE_SOURCE));
    }

    #[tokio::test]
    async fn test_mock_strategy_with_no_mocks_is_empty() {
        let feeds = vec![FeedSource::new("Dev.to", "https://dev.to/feed", None)];
        assert!(FetchStrategy::Mock.fetch_multiple_feeds(&feeds).await.is_empty());
    }

    #[test]
    fn test_strategy_kind_from_config() {
        let config = Config::default();
        let strategy = FetchStrategy::new(StrategyKind::Direct, reqwest::Client::new(), &config);
        assert_eq!(strategy.kind(), StrategyKind::Direct);
        assert_eq!(StrategyKind::Live.to_string(), "live");
    }
}
