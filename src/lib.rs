//! newsdesk: a terminal news aggregator.
//!
//! Fetches RSS feeds (live through rss2json, directly, or from bundled mock
//! data), keeps the latest snapshot plus saved/ignored links and
//! preferences in SQLite, and extracts readable article text through
//! content proxies.

pub mod app;
pub mod config;
pub mod content;
pub mod feed;
pub mod filter;
pub mod http;
pub mod preferences;
pub mod storage;
pub mod theme;
pub mod ui;
pub mod util;
