//! Reader mode: fetch an article page through a content proxy and extract
//! its readable parts.
//!
//! - [`provider`] - the proxy services pages are fetched through
//! - [`extract`] - regex heuristics that pull title, byline, image and body
//!   out of raw HTML
//! - [`ReaderService`] - provider fallback, request spacing and temporary
//!   suppression of failing providers

pub mod extract;
pub mod provider;
mod reader;

use serde::{Deserialize, Serialize};

pub use extract::ExtractError;
pub use provider::{Provider, ProviderKind};
pub use reader::{fallback_result, ReaderError, ReaderService};

/// Outcome of a reader-mode extraction.
///
/// `success == false` marks a fallback result; its `error` carries the
/// reason and its `content` explains the situation with a link to the
/// original article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderResult {
    pub title: String,
    /// Cleaned article HTML.
    pub content: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
