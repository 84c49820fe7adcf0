//! Application state shared by every command.
//!
//! `App` owns the configuration, database, fetch strategy, reader service
//! and preference manager, and implements the operations the CLI exposes.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::content::{ProviderKind, ReaderResult, ReaderService};
use crate::feed::{opml, FeedSource, FetchStrategy, NewsItem, StrategyKind};
use crate::filter::{ArticleFilter, ViewInputs, ViewState};
use crate::http::build_client;
use crate::preferences::PreferenceManager;
use crate::storage::Database;

/// Shown when a refresh produced no articles at all.
pub const EMPTY_FETCH_MESSAGE: &str =
    "No articles could be loaded from RSS feeds. This might be a temporary issue with the feed sources.";

// ============================================================================
// Article references
// ============================================================================

/// How the user names an article on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleRef {
    /// 1-based number from the last listing.
    Index(usize),
    Link(String),
}

impl ArticleRef {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<usize>() {
            Ok(n) => ArticleRef::Index(n),
            Err(_) => ArticleRef::Link(trimmed.to_string()),
        }
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Options for [`App::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Sources to show for this call only. Empty uses the saved selection.
    pub sources: Vec<String>,
    pub saved_only: bool,
    pub show_ignored: bool,
    /// Use the stored snapshot instead of fetching.
    pub offline: bool,
    pub limit: Option<usize>,
}

/// The result of a listing: the snapshot plus what to show from it.
#[derive(Debug, Clone)]
pub struct ListView {
    pub items: Vec<NewsItem>,
    /// Indices into `items` of the visible articles, in order.
    pub visible: Vec<usize>,
    pub saved: HashSet<String>,
    pub ignored: HashSet<String>,
    pub state: ViewState,
    /// Overrides the state's default message when set.
    pub error: Option<String>,
}

impl ListView {
    pub fn message(&self) -> Option<&str> {
        self.error.as_deref().or_else(|| self.state.message())
    }
}

/// A reader result and where it came from.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub link: String,
    pub result: ReaderResult,
    pub from_cache: bool,
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    config: Config,
    db: Database,
    strategy: FetchStrategy,
    reader: ReaderService,
    prefs: PreferenceManager,
}

impl App {
    /// Build the app with the shared HTTP client.
    pub async fn new(config: Config, db: Database) -> Result<Self> {
        let client = build_client().context("Failed to build HTTP client")?;
        Self::with_client(config, db, client).await
    }

    /// Build the app around an existing client.
    ///
    /// On first run the feed table is seeded from the configured feeds;
    /// after that the database is the source of truth.
    pub async fn with_client(config: Config, db: Database, client: reqwest::Client) -> Result<Self> {
        if db.get_feeds().await?.is_empty() && !config.feeds.is_empty() {
            db.sync_feeds(&config.feeds)
                .await
                .context("Failed to seed feeds")?;
            tracing::info!(count = config.feeds.len(), "Seeded feeds from configuration");
        }

        let strategy = FetchStrategy::new(config.strategy, client.clone(), &config);
        let reader = ReaderService::new(client, &config.reader).with_store(db.clone());
        let prefs = PreferenceManager::load(&config, &db)
            .await
            .context("Failed to load preferences")?;

        Ok(Self {
            config,
            db,
            strategy,
            reader,
            prefs,
        })
    }

    /// Replace the reader service, e.g. to point at test providers.
    ///
    /// The replacement keeps its backoff state in this app's database.
    pub fn with_reader(mut self, reader: ReaderService) -> Self {
        self.reader = reader.with_store(self.db.clone());
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn prefs(&self) -> &PreferenceManager {
        &self.prefs
    }

    pub fn prefs_mut(&mut self) -> &mut PreferenceManager {
        &mut self.prefs
    }

    // ------------------------------------------------------------------------
    // Articles
    // ------------------------------------------------------------------------

    /// Fetch every feed and store the result as the current snapshot.
    ///
    /// An empty fetch leaves the previous snapshot in place. Otherwise
    /// ignored links that dropped out of the feeds are forgotten.
    pub async fn refresh(&self) -> Result<Vec<NewsItem>> {
        let feeds = self.db.get_feeds().await?;
        let items = self.strategy.fetch_multiple_feeds(&feeds).await;

        if items.is_empty() {
            tracing::warn!(feeds = feeds.len(), "Refresh produced no articles");
            return Ok(items);
        }

        self.db
            .replace_snapshot(&items)
            .await
            .context("Failed to store articles")?;
        self.prefs
            .cleanup_ignored_articles(items.iter().map(|i| i.link.as_str()))
            .await?;
        Ok(items)
    }

    /// Build a listing: refresh (unless offline), filter, and compute the
    /// view state.
    pub async fn list(&self, options: &ListOptions) -> Result<ListView> {
        let (items, error) = if options.offline {
            (self.db.get_snapshot().await?, None)
        } else {
            let items = self.refresh().await?;
            let error = items.is_empty().then(|| EMPTY_FETCH_MESSAGE.to_string());
            (items, error)
        };

        let saved: HashSet<String> = self.prefs.saved_articles().await?.into_iter().collect();
        let ignored: HashSet<String> = self.prefs.ignored_articles().await?.into_iter().collect();

        let filter = ArticleFilter {
            selected_sources: if options.sources.is_empty() {
                self.prefs.selected_sources().to_vec()
            } else {
                options.sources.clone()
            },
            saved_only: options.saved_only,
            show_ignored: options.show_ignored,
        };

        let mut visible: Vec<usize> = {
            let saved_refs: HashSet<&str> = saved.iter().map(String::as_str).collect();
            let ignored_refs: HashSet<&str> = ignored.iter().map(String::as_str).collect();
            filter
                .apply(&items, &saved_refs, &ignored_refs)
                .into_iter()
                .map(|(i, _)| i)
                .collect()
        };

        // The state describes the filter result, not the page the limit cuts.
        let state = ViewState::compute(&ViewInputs {
            loading: false,
            has_error: error.is_some(),
            total_articles: items.len(),
            filtered_articles: visible.len(),
            saved_only: options.saved_only,
            saved_count: saved.len(),
        });

        if let Some(limit) = options.limit {
            visible.truncate(limit);
        }

        Ok(ListView {
            items,
            visible,
            saved,
            ignored,
            state,
            error,
        })
    }

    /// Resolve a listing number or link to an article link.
    pub async fn resolve_ref(&self, article: &ArticleRef) -> Result<String> {
        match article {
            ArticleRef::Link(link) if link.is_empty() => bail!("Article reference is empty"),
            ArticleRef::Link(link) => Ok(link.clone()),
            ArticleRef::Index(0) => bail!("Article numbers start at 1"),
            ArticleRef::Index(n) => self.db.snapshot_link_at(n - 1).await?.with_context(|| {
                format!("No article #{n} in the last listing. Run `newsdesk list` first.")
            }),
        }
    }

    /// Reader view for `link`.
    ///
    /// Unexpired cached results are served unless `refresh` is set. Only
    /// successful extractions are cached.
    pub async fn read(&self, link: &str, refresh: bool) -> Result<ReadOutcome> {
        if !refresh {
            if let Some(cached) = self.db.get_cached_result(link).await? {
                tracing::debug!(url = %link, fetched_at = %cached.fetched_at, "Serving cached article");
                return Ok(ReadOutcome {
                    link: link.to_string(),
                    result: cached.result,
                    from_cache: true,
                });
            }
        }

        let result = self.reader.extract_article(link).await?;
        if result.success {
            if let Err(e) = self
                .db
                .cache_result(link, &result, self.config.reader.cache_ttl_hours)
                .await
            {
                tracing::warn!(url = %link, error = %e, "Failed to cache article");
            }
        }

        Ok(ReadOutcome {
            link: link.to_string(),
            result,
            from_cache: false,
        })
    }

    /// Reader providers in fallback order, each with the time it will be
    /// tried again if a recent failure is keeping it suppressed.
    pub async fn reader_status(&self) -> Vec<(ProviderKind, Option<DateTime<Utc>>)> {
        self.reader.provider_status().await
    }

    // ------------------------------------------------------------------------
    // Feeds
    // ------------------------------------------------------------------------

    pub async fn feeds(&self) -> Result<Vec<FeedSource>> {
        self.db.get_feeds().await
    }

    /// Import feeds from an OPML file. Returns (feeds in file, newly added).
    pub async fn import_opml(&self, path: &Path) -> Result<(usize, usize)> {
        let feeds = opml::import_file(path).await?;
        let before = self.db.get_feeds().await?.len();
        self.db.sync_feeds(&feeds).await?;
        let after = self.db.get_feeds().await?.len();
        Ok((feeds.len(), after - before))
    }

    /// Export the feed list as OPML. Returns the number of feeds written.
    pub async fn export_opml(&self, path: &Path) -> Result<usize> {
        let feeds = self.db.get_feeds().await?;
        opml::export_to_file(&feeds, path)?;
        Ok(feeds.len())
    }

    pub async fn remove_feed(&self, url: &str) -> Result<bool> {
        self.db.delete_feed_by_url(url).await
    }
}
