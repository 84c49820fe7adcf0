use anyhow::Result;
use sha2::{Digest, Sha256};

use super::schema::Database;
use super::types::{CacheStats, CachedResult};
use crate::content::ReaderResult;

/// Default TTL for cached content (72 hours)
pub const DEFAULT_TTL_HOURS: i64 = 72;

/// Cache key for an article URL: lowercase hex SHA-256.
pub fn url_hash(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

impl Database {
    // ========================================================================
    // Content Cache Operations
    // ========================================================================

    /// Cache a reader result for `url`, replacing any previous entry.
    ///
    /// `ttl_hours` is clamped to at least one hour.
    pub async fn cache_result(&self, url: &str, result: &ReaderResult, ttl_hours: i64) -> Result<()> {
        let json = serde_json::to_string(result)?;
        let ttl_modifier = format!("+{} hours", ttl_hours.max(1));

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO content_cache
                (url_hash, url, result, fetched_at, expires_at, size_bytes)
            VALUES (?, ?, ?, datetime('now'), datetime('now', ?), ?)
        "#,
        )
        .bind(url_hash(url))
        .bind(url)
        .bind(&json)
        .bind(&ttl_modifier)
        .bind(json.len() as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The cached result for `url`, or `None` if absent or expired.
    ///
    /// Entries that no longer deserialize are treated as misses.
    pub async fn get_cached_result(&self, url: &str) -> Result<Option<CachedResult>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT result, fetched_at, expires_at
            FROM content_cache
            WHERE url_hash = ? AND expires_at > datetime('now')
        "#,
        )
        .bind(url_hash(url))
        .fetch_optional(&self.pool)
        .await?;

        let Some((json, fetched_at, expires_at)) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<ReaderResult>(&json) {
            Ok(result) => Ok(Some(CachedResult {
                result,
                fetched_at,
                expires_at,
            })),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Discarding unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Delete all expired cache entries.
    ///
    /// Returns the number of entries evicted.
    pub async fn evict_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM content_cache WHERE expires_at <= datetime('now')")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Entry count, expired count, total size and oldest/newest `fetched_at`.
    pub async fn cache_stats(&self) -> Result<CacheStats> {
        let row: (i64, i64, Option<i64>, Option<String>, Option<String>) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(CASE WHEN expires_at <= datetime('now') THEN 1 END),
                   SUM(size_bytes),
                   MIN(fetched_at),
                   MAX(fetched_at)
            FROM content_cache
        "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CacheStats {
            total_entries: row.0,
            expired_entries: row.1,
            total_size_bytes: row.2.unwrap_or(0),
            oldest_entry: row.3,
            newest_entry: row.4,
        })
    }

    /// Remove every cache entry. Returns the number removed.
    pub async fn clear_cache(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM content_cache")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::url_hash;
    use crate::content::ReaderResult;
    use crate::storage::Database;
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn result(title: &str) -> ReaderResult {
        ReaderResult {
            title: title.to_string(),
            content: "<p>Body</p>".to_string(),
            excerpt: "Body".to_string(),
            author: Some("Jane Doe".to_string()),
            published_date: None,
            site_name: Some("example.com".to_string()),
            image_url: None,
            success: true,
            error: None,
        }
    }

    async fn expire_all(db: &Database) {
        sqlx::query("UPDATE content_cache SET expires_at = datetime('now', '-1 hours')")
            .execute(&db.pool)
            .await
            .unwrap();
    }

    #[test]
    fn test_url_hash_is_sha256_hex() {
        assert_eq!(
            url_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(url_hash("https://a"), url_hash("https://b"));
    }

    #[tokio::test]
    async fn test_cache_and_get() {
        let db = test_db().await;
        db.cache_result("https://example.com/a", &result("A"), 72)
            .await
            .unwrap();

        let cached = db
            .get_cached_result("https://example.com/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.result, result("A"));
        assert!(cached.expires_at > cached.fetched_at);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let db = test_db().await;
        assert!(db
            .get_cached_result("https://example.com/none")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_cache_replaces_entry() {
        let db = test_db().await;
        db.cache_result("https://example.com/a", &result("Old"), 72)
            .await
            .unwrap();
        db.cache_result("https://example.com/a", &result("New"), 72)
            .await
            .unwrap();

        let cached = db
            .get_cached_result("https://example.com/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.result.title, "New");
        assert_eq!(db.cache_stats().await.unwrap().total_entries, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_and_evicted() {
        let db = test_db().await;
        db.cache_result("https://example.com/a", &result("A"), 72)
            .await
            .unwrap();
        expire_all(&db).await;

        assert!(db
            .get_cached_result("https://example.com/a")
            .await
            .unwrap()
            .is_none());

        let stats = db.cache_stats().await.unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.expired_entries, 1);

        assert_eq!(db.evict_expired().await.unwrap(), 1);
        assert_eq!(db.cache_stats().await.unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_cache_stats_and_clear() {
        let db = test_db().await;
        let empty = db.cache_stats().await.unwrap();
        assert_eq!(empty.total_entries, 0);
        assert_eq!(empty.total_size_bytes, 0);
        assert_eq!(empty.oldest_entry, None);

        db.cache_result("https://example.com/a", &result("A"), 1)
            .await
            .unwrap();
        db.cache_result("https://example.com/b", &result("B"), 1)
            .await
            .unwrap();

        let stats = db.cache_stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 0);
        assert!(stats.total_size_bytes > 0);
        assert!(stats.newest_entry.is_some());

        assert_eq!(db.clear_cache().await.unwrap(), 2);
        assert_eq!(db.cache_stats().await.unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_miss() {
        let db = test_db().await;
        db.cache_result("https://example.com/a", &result("A"), 72)
            .await
            .unwrap();
        sqlx::query("UPDATE content_cache SET result = 'not json'")
            .execute(&db.pool)
            .await
            .unwrap();

        assert!(db
            .get_cached_result("https://example.com/a")
            .await
            .unwrap()
            .is_none());
    }
}
