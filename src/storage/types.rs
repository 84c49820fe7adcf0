use thiserror::Error;

use crate::content::ReaderResult;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of newsdesk appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_CANTOPEN (14) shows up when another process holds an
        // exclusive lock during open.
        if Self::is_lock_message(&error_string)
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }

    /// SQLITE_BUSY (5) and SQLITE_LOCKED (6), matched on the lower-cased message.
    pub(crate) fn is_lock_message(error_string: &str) -> bool {
        error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
    }
}

// ============================================================================
// Link Lists
// ============================================================================

/// The two per-user link lists. Both hold article links in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkList {
    Saved,
    Ignored,
}

impl LinkList {
    pub(crate) fn table(self) -> &'static str {
        match self {
            LinkList::Saved => "saved_articles",
            LinkList::Ignored => "ignored_articles",
        }
    }
}

// ============================================================================
// Content Cache
// ============================================================================

/// A cached reader result with its timestamps (SQLite `datetime` format, UTC).
#[derive(Debug, Clone)]
pub struct CachedResult {
    pub result: ReaderResult,
    pub fetched_at: String,
    pub expires_at: String,
}

/// Aggregate content cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: i64,
    pub expired_entries: i64,
    pub total_size_bytes: i64,
    pub oldest_entry: Option<String>,
    pub newest_entry: Option<String>,
}
