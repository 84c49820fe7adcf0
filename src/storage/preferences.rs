use anyhow::Result;

use super::schema::Database;

/// `LIKE` pattern matching keys that start with `prefix` literally.
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Database {
    // ========================================================================
    // User Preferences Operations
    // ========================================================================

    /// Get a single preference value by key.
    ///
    /// Keys use dotted convention: `sources.selected`, `theme.variant`, etc.
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a preference value (UPSERT).
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All preferences whose key starts with `prefix`, ordered by key.
    pub async fn get_preferences_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r"SELECT key, value FROM user_preferences WHERE key LIKE ? ESCAPE '\' ORDER BY key",
        )
        .bind(prefix_pattern(prefix))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Delete all preferences whose key starts with `prefix`.
    ///
    /// An empty prefix deletes every preference. Returns the number deleted.
    pub async fn delete_preferences_by_prefix(&self, prefix: &str) -> Result<u64> {
        let result =
            sqlx::query(r"DELETE FROM user_preferences WHERE key LIKE ? ESCAPE '\'")
                .bind(prefix_pattern(prefix))
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::prefix_pattern;
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_preference_missing() {
        let db = test_db().await;
        let value = db.get_preference("nonexistent.key").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_preference_upsert() {
        let db = test_db().await;
        db.set_preference("theme.variant", "dark").await.unwrap();
        db.set_preference("theme.variant", "light").await.unwrap();

        let value = db.get_preference("theme.variant").await.unwrap();
        assert_eq!(value, Some("light".to_string()));
    }

    #[tokio::test]
    async fn test_get_preferences_by_prefix() {
        let db = test_db().await;
        db.set_preference("sources.selected", "[]").await.unwrap();
        db.set_preference("theme.variant", "dark").await.unwrap();
        db.set_preference("thematic.value", "x").await.unwrap();

        let prefs = db.get_preferences_by_prefix("theme.").await.unwrap();
        assert_eq!(prefs, vec![("theme.variant".to_string(), "dark".to_string())]);
    }

    #[tokio::test]
    async fn test_prefix_underscore_is_literal() {
        let db = test_db().await;
        db.set_preference("a_b.key", "1").await.unwrap();
        db.set_preference("axb.key", "2").await.unwrap();

        let prefs = db.get_preferences_by_prefix("a_b").await.unwrap();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].0, "a_b.key");
    }

    #[tokio::test]
    async fn test_delete_preferences_by_prefix() {
        let db = test_db().await;
        db.set_preference("theme.variant", "dark").await.unwrap();
        db.set_preference("sources.selected", "[\"BBC News\"]")
            .await
            .unwrap();

        assert_eq!(db.delete_preferences_by_prefix("theme.").await.unwrap(), 1);
        assert_eq!(db.get_preference("theme.variant").await.unwrap(), None);
        assert!(db.get_preference("sources.selected").await.unwrap().is_some());

        assert_eq!(db.delete_preferences_by_prefix("").await.unwrap(), 1);
        assert!(db.get_preferences_by_prefix("").await.unwrap().is_empty());
    }

    #[test]
    fn test_prefix_pattern_escapes_wildcards() {
        assert_eq!(prefix_pattern("theme."), "theme.%");
        assert_eq!(prefix_pattern("100%_"), r"100\%\_%");
    }
}
