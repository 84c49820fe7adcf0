use anyhow::Result;
use chrono::{DateTime, Utc};

use super::schema::Database;

impl Database {
    // ========================================================================
    // Reader State Operations
    // ========================================================================

    /// Every persisted reader timestamp, ordered by key.
    ///
    /// Keys are `last_request` and `suppressed.<provider id>`. Rows whose
    /// value is outside chrono's range are skipped.
    pub async fn get_reader_timestamps(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT key, at_ms FROM reader_state ORDER BY key")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, at_ms)| match DateTime::from_timestamp_millis(at_ms) {
                Some(at) => Some((key, at)),
                None => {
                    tracing::warn!(key = %key, at_ms, "Skipping out-of-range reader timestamp");
                    None
                }
            })
            .collect())
    }

    /// Store `at` under `key` (UPSERT), with millisecond precision.
    pub async fn set_reader_timestamp(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reader_state (key, at_ms)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET at_ms = excluded.at_ms
        "#,
        )
        .bind(key)
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns true if a timestamp was deleted.
    pub async fn delete_reader_timestamp(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reader_state WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_timestamps_upsert_and_delete() {
        let db = Database::open(":memory:").await.unwrap();
        assert!(db.get_reader_timestamps().await.unwrap().is_empty());

        let first = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let later = DateTime::from_timestamp_millis(1_700_000_060_456).unwrap();
        db.set_reader_timestamp("suppressed.allorigins", first).await.unwrap();
        db.set_reader_timestamp("last_request", first).await.unwrap();
        db.set_reader_timestamp("suppressed.allorigins", later).await.unwrap();

        assert_eq!(
            db.get_reader_timestamps().await.unwrap(),
            vec![
                ("last_request".to_string(), first),
                ("suppressed.allorigins".to_string(), later),
            ]
        );

        assert!(db.delete_reader_timestamp("suppressed.allorigins").await.unwrap());
        assert!(!db.delete_reader_timestamp("suppressed.allorigins").await.unwrap());
        assert_eq!(db.get_reader_timestamps().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_rows_are_skipped() {
        let db = Database::open(":memory:").await.unwrap();
        sqlx::query("INSERT INTO reader_state (key, at_ms) VALUES ('last_request', ?)")
            .bind(i64::MAX)
            .execute(&db.pool)
            .await
            .unwrap();

        assert!(db.get_reader_timestamps().await.unwrap().is_empty());
    }
}
