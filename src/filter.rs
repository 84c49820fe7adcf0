//! Which articles a listing shows, and what to say when it shows none.

use std::collections::{BTreeSet, HashSet};

use crate::feed::NewsItem;

/// Distinct source names in `items`, sorted.
pub fn available_sources(items: &[NewsItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.source_name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Listing filter.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    /// Source names to keep. Empty keeps every source.
    pub selected_sources: Vec<String>,
    /// Keep only saved links.
    pub saved_only: bool,
    /// Keep ignored links instead of hiding them.
    pub show_ignored: bool,
}

impl ArticleFilter {
    /// Items that pass the filter, with their index in `items`.
    pub fn apply<'a>(
        &self,
        items: &'a [NewsItem],
        saved: &HashSet<&str>,
        ignored: &HashSet<&str>,
    ) -> Vec<(usize, &'a NewsItem)> {
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.matches(item, saved, ignored))
            .collect()
    }

    fn matches(&self, item: &NewsItem, saved: &HashSet<&str>, ignored: &HashSet<&str>) -> bool {
        let link = item.link.as_str();
        if !self.selected_sources.is_empty()
            && !self.selected_sources.iter().any(|s| *s == item.source_name)
        {
            return false;
        }
        if self.saved_only && !saved.contains(link) {
            return false;
        }
        self.show_ignored || !ignored.contains(link)
    }
}

// ============================================================================
// View State
// ============================================================================

/// What the article view should display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Error,
    NoArticles,
    NoFilteredArticles,
    NoSavedArticles,
    NoFilteredSavedArticles,
    Success,
}

/// Inputs to [`ViewState::compute`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewInputs {
    pub loading: bool,
    pub has_error: bool,
    pub total_articles: usize,
    pub filtered_articles: usize,
    pub saved_only: bool,
    pub saved_count: usize,
}

impl ViewState {
    /// An error wins over loading, which wins over every empty state.
    pub fn compute(inputs: &ViewInputs) -> Self {
        if inputs.has_error {
            return ViewState::Error;
        }
        if inputs.loading {
            return ViewState::Loading;
        }
        if inputs.total_articles == 0 {
            return ViewState::NoArticles;
        }
        if inputs.filtered_articles == 0 {
            if inputs.saved_only {
                return if inputs.saved_count == 0 {
                    ViewState::NoSavedArticles
                } else {
                    ViewState::NoFilteredSavedArticles
                };
            }
            return ViewState::NoFilteredArticles;
        }
        ViewState::Success
    }

    /// Message shown to the user, or `None` for a populated listing.
    pub fn message(self) -> Option<&'static str> {
        match self {
            ViewState::Loading => Some("Loading latest news..."),
            ViewState::Error => Some("An error occurred while loading articles."),
            ViewState::NoArticles => {
                Some("No articles found. Please check your internet connection and try again.")
            }
            ViewState::NoFilteredArticles => Some("No articles match your current source filters."),
            ViewState::NoSavedArticles => {
                Some("No saved articles yet. Start saving articles you want to read later!")
            }
            ViewState::NoFilteredSavedArticles => {
                Some("No saved articles match your current source filters.")
            }
            ViewState::Success => None,
        }
    }
}
