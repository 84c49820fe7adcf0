use anyhow::Result;

use super::schema::Database;
use crate::feed::FeedSource;

type FeedRow = (String, String, Option<String>);

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Upsert feeds by URL.
    ///
    /// New feeds are appended after the existing ones in the order given.
    /// Known URLs keep their position but take the new name and category.
    pub async fn sync_feeds(&self, feeds: &[FeedSource]) -> Result<()> {
        if feeds.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for feed in feeds {
            sqlx::query(
                r#"
                INSERT INTO feeds (name, url, category, position)
                VALUES (?, ?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM feeds))
                ON CONFLICT(url) DO UPDATE SET name = excluded.name, category = excluded.category
            "#,
            )
            .bind(&feed.name)
            .bind(&feed.url)
            .bind(&feed.category)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Add a single feed at the end of the list.
    ///
    /// Returns `false` if a feed with the same URL already exists.
    pub async fn insert_feed(&self, feed: &FeedSource) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO feeds (name, url, category, position)
            VALUES (?, ?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM feeds))
            ON CONFLICT(url) DO NOTHING
        "#,
        )
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(&feed.category)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove the feed with the given URL. Returns whether a row was deleted.
    pub async fn delete_feed_by_url(&self, url: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All configured feeds in list order.
    pub async fn get_feeds(&self) -> Result<Vec<FeedSource>> {
        let rows: Vec<FeedRow> =
            sqlx::query_as("SELECT name, url, category FROM feeds ORDER BY position, id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(name, url, category)| FeedSource {
                name,
                url,
                category,
            })
            .collect())
    }
}
