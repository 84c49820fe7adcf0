//! Feed fetching and normalization.
//!
//! Every fetch path produces [`NewsItem`]s, selected at runtime through
//! [`FetchStrategy`]:
//!
//! - **Live**: the rss2json conversion API, with retry and fallback data
//! - **Mock**: bundled rss2json-format fixtures, for development
//! - **Direct**: the feed XML itself, parsed with `feed-rs`
//!
//! [`opml`] imports and exports the configured feed list.

mod fetcher;
pub mod mock;
pub mod opml;
mod parser;
pub mod rss2json;
pub mod sample;
mod strategy;
mod types;

pub use fetcher::{fetch_direct, fetch_one, FetchError};
pub use parser::parse_feed;
pub use rss2json::{Rss2JsonClient, Rss2JsonError};
pub use strategy::{FetchStrategy, StrategyKind};
pub use types::{
    default_feeds, parse_pub_date, sort_and_dedup, try_parse_pub_date, FeedSource, NewsItem,
};
