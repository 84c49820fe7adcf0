//! User preferences: selected sources, theme, and the saved/ignored lists.
//!
//! Config values serve as defaults; DB values (user_preferences table)
//! override them. Writes always go to the DB, never to the config file.
use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::storage::{Database, LinkList};
use crate::theme::ThemeVariant;

const KEY_SELECTED_SOURCES: &str = "sources.selected";
const KEY_THEME: &str = "theme.variant";
const KEY_UPDATED_AT: &str = "preferences.updated_at";

// ============================================================================
// UserPreferences
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct UserPreferences {
    /// Source names to show. Empty means every source.
    pub selected_sources: Vec<String>,
    pub theme: ThemeVariant,
    pub last_updated: DateTime<Utc>,
}

impl UserPreferences {
    fn defaults(config: &Config) -> Self {
        Self {
            selected_sources: Vec::new(),
            theme: ThemeVariant::from_str_name(&config.theme).unwrap_or_default(),
            last_updated: Utc::now(),
        }
    }
}

/// A partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct PreferencesUpdate {
    pub selected_sources: Option<Vec<String>>,
    pub theme: Option<ThemeVariant>,
}

// ============================================================================
// PreferenceManager
// ============================================================================

/// Preference store backed by the database.
///
/// The scalar preferences are held in memory after `load`; the saved and
/// ignored link lists are always read from the DB.
pub struct PreferenceManager {
    db: Database,
    defaults: UserPreferences,
    prefs: UserPreferences,
}

impl PreferenceManager {
    /// Load preferences: config defaults first, then DB overrides.
    ///
    /// Stored values that no longer parse are logged and skipped.
    pub async fn load(config: &Config, db: &Database) -> Result<Self> {
        let defaults = UserPreferences::defaults(config);
        let mut prefs = defaults.clone();

        if let Some(raw) = db.get_preference(KEY_SELECTED_SOURCES).await? {
            match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(sources) => prefs.selected_sources = sources,
                Err(e) => {
                    tracing::warn!(key = KEY_SELECTED_SOURCES, error = %e, "Ignoring unreadable preference")
                }
            }
        }

        if let Some(raw) = db.get_preference(KEY_THEME).await? {
            match ThemeVariant::from_str_name(&raw) {
                Some(theme) => prefs.theme = theme,
                None => tracing::warn!(key = KEY_THEME, value = %raw, "Ignoring unknown theme"),
            }
        }

        if let Some(raw) = db.get_preference(KEY_UPDATED_AT).await? {
            if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
                prefs.last_updated = ts.with_timezone(&Utc);
            }
        }

        Ok(Self {
            db: db.clone(),
            defaults,
            prefs,
        })
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.prefs
    }

    pub fn selected_sources(&self) -> &[String] {
        &self.prefs.selected_sources
    }

    pub fn theme(&self) -> ThemeVariant {
        self.prefs.theme
    }

    /// Apply a partial update, persist the changed fields, and stamp
    /// `last_updated`.
    pub async fn update(&mut self, update: PreferencesUpdate) -> Result<()> {
        if let Some(sources) = update.selected_sources {
            self.db
                .set_preference(KEY_SELECTED_SOURCES, &serde_json::to_string(&sources)?)
                .await?;
            self.prefs.selected_sources = sources;
        }
        if let Some(theme) = update.theme {
            self.db.set_preference(KEY_THEME, theme.name()).await?;
            self.prefs.theme = theme;
        }

        let now = Utc::now();
        self.db
            .set_preference(KEY_UPDATED_AT, &now.to_rfc3339())
            .await?;
        self.prefs.last_updated = now;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------------

    pub async fn update_selected_sources(&mut self, sources: Vec<String>) -> Result<()> {
        self.update(PreferencesUpdate {
            selected_sources: Some(sources),
            ..Default::default()
        })
        .await
    }

    /// Add `source` to the selection, or remove it if already selected.
    ///
    /// Returns whether the source is selected afterwards.
    pub async fn toggle_source(&mut self, source: &str) -> Result<bool> {
        let mut sources = self.prefs.selected_sources.clone();
        let selected = if let Some(pos) = sources.iter().position(|s| s == source) {
            sources.remove(pos);
            false
        } else {
            sources.push(source.to_string());
            true
        };
        self.update_selected_sources(sources).await?;
        Ok(selected)
    }

    // ------------------------------------------------------------------------
    // Saved articles
    // ------------------------------------------------------------------------

    pub async fn save_article(&self, link: &str) -> Result<()> {
        self.db.add_link(LinkList::Saved, link).await?;
        Ok(())
    }

    pub async fn unsave_article(&self, link: &str) -> Result<()> {
        self.db.remove_link(LinkList::Saved, link).await?;
        Ok(())
    }

    /// Returns whether the article is saved afterwards.
    pub async fn toggle_save_article(&self, link: &str) -> Result<bool> {
        self.toggle_link(LinkList::Saved, link).await
    }

    pub async fn is_article_saved(&self, link: &str) -> Result<bool> {
        self.db.contains_link(LinkList::Saved, link).await
    }

    pub async fn saved_articles(&self) -> Result<Vec<String>> {
        self.db.list_links(LinkList::Saved).await
    }

    // ------------------------------------------------------------------------
    // Ignored articles
    // ------------------------------------------------------------------------

    pub async fn ignore_article(&self, link: &str) -> Result<()> {
        self.db.add_link(LinkList::Ignored, link).await?;
        Ok(())
    }

    pub async fn unignore_article(&self, link: &str) -> Result<()> {
        self.db.remove_link(LinkList::Ignored, link).await?;
        Ok(())
    }

    /// Returns whether the article is ignored afterwards.
    pub async fn toggle_ignore_article(&self, link: &str) -> Result<bool> {
        self.toggle_link(LinkList::Ignored, link).await
    }

    pub async fn is_article_ignored(&self, link: &str) -> Result<bool> {
        self.db.contains_link(LinkList::Ignored, link).await
    }

    pub async fn ignored_articles(&self) -> Result<Vec<String>> {
        self.db.list_links(LinkList::Ignored).await
    }

    /// Forget ignored links that are no longer in the current listing.
    ///
    /// Keeps the ignore list from growing without bound. Returns the number
    /// of links removed.
    pub async fn cleanup_ignored_articles<'a, I>(&self, current_links: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: HashSet<&str> = current_links.into_iter().collect();
        let removed = self.db.retain_links(LinkList::Ignored, &keep).await?;
        if removed > 0 {
            tracing::info!(removed, "Cleaned up old ignored articles");
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Theme
    // ------------------------------------------------------------------------

    pub async fn update_theme(&mut self, theme: ThemeVariant) -> Result<()> {
        self.update(PreferencesUpdate {
            theme: Some(theme),
            ..Default::default()
        })
        .await
    }

    /// Switch between light and dark. Returns the new theme.
    pub async fn toggle_theme(&mut self) -> Result<ThemeVariant> {
        let theme = self.prefs.theme.toggle();
        self.update_theme(theme).await?;
        Ok(theme)
    }

    // ------------------------------------------------------------------------

    /// Drop every stored preference and both link lists.
    pub async fn clear_all(&mut self) -> Result<()> {
        self.db.delete_preferences_by_prefix("").await?;
        self.db.clear_links(LinkList::Saved).await?;
        self.db.clear_links(LinkList::Ignored).await?;

        self.prefs = UserPreferences {
            last_updated: Utc::now(),
            ..self.defaults.clone()
        };
        Ok(())
    }

    async fn toggle_link(&self, list: LinkList, link: &str) -> Result<bool> {
        if self.db.contains_link(list, link).await? {
            self.db.remove_link(list, link).await?;
            Ok(false)
        } else {
            self.db.add_link(list, link).await?;
            Ok(true)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
