//! Configuration file parser for ~/.config/newsdesk/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though a warning is logged for each
//! unknown top-level key so typos are visible with `RUST_LOG=warn`.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::feed::{default_feeds, FeedSource, StrategyKind};
use crate::storage::DEFAULT_TTL_HOURS;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// SEC-015: Secrets (`rss2json.api_key`, `reader.corssh_api_key`) are masked
/// by the custom Debug impls below.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How feeds are fetched: `live` (rss2json), `mock` or `direct`.
    pub strategy: StrategyKind,

    /// Default theme variant ("light" or "dark"); a stored preference wins.
    pub theme: String,

    /// Feed sources seeded into the database on startup.
    pub feeds: Vec<FeedSource>,

    pub rss2json: Rss2JsonConfig,

    pub reader: ReaderConfig,

    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Live,
            theme: "light".to_string(),
            feeds: default_feeds(),
            rss2json: Rss2JsonConfig::default(),
            reader: ReaderConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("strategy", &self.strategy)
            .field("theme", &self.theme)
            .field("feeds", &self.feeds.len())
            .field("rss2json", &self.rss2json)
            .field("reader", &self.reader)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Settings for the rss2json conversion API (live strategy).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Rss2JsonConfig {
    pub base_url: String,
    /// Optional key; raises the API's per-day quota.
    pub api_key: Option<String>,
}

impl Default for Rss2JsonConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.rss2json.com/v1/api.json".to_string(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for Rss2JsonConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rss2JsonConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Settings for the reader extraction pipeline.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Minimum spacing between consecutive extractions, in milliseconds.
    pub request_delay_ms: u64,
    /// Lifetime of cached reader results, in hours.
    pub cache_ttl_hours: i64,
    pub allorigins_url: String,
    pub jsonproxy_url: String,
    pub corssh_url: String,
    /// cors.sh API key (alternative to the CORS_SH_API_KEY env var).
    pub corssh_api_key: Option<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
            cache_ttl_hours: DEFAULT_TTL_HOURS,
            allorigins_url: "https://api.allorigins.win".to_string(),
            jsonproxy_url: "https://jsonp.afeld.me".to_string(),
            corssh_url: "https://cors.sh".to_string(),
            corssh_api_key: None,
        }
    }
}

impl ReaderConfig {
    /// Resolves the cors.sh key. The env var takes precedence over the file.
    pub fn resolved_corssh_api_key(&self) -> Option<String> {
        std::env::var("CORS_SH_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.corssh_api_key.clone())
    }
}

impl std::fmt::Debug for ReaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderConfig")
            .field("request_delay_ms", &self.request_delay_ms)
            .field("cache_ttl_hours", &self.cache_ttl_hours)
            .field("allorigins_url", &self.allorigins_url)
            .field("jsonproxy_url", &self.jsonproxy_url)
            .field("corssh_url", &self.corssh_url)
            .field(
                "corssh_api_key",
                &self.corssh_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Retry policy for feed fetches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per feed, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] =
        ["strategy", "theme", "feeds", "rss2json", "reader", "retry"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            strategy = ?config.strategy,
            feeds = config.feeds.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
