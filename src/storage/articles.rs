use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use crate::feed::{parse_pub_date, NewsItem};

type ArticleRow = (
    i64,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    String,
);

impl Database {
    // ========================================================================
    // Article Snapshot Operations
    // ========================================================================

    /// Replace the stored snapshot with `items`, keeping their order.
    ///
    /// Runs in one transaction so readers never see a half-written listing.
    /// Rows are inserted in batches of 100 to stay under SQLite's
    /// bind-parameter limit.
    pub async fn replace_snapshot(&self, items: &[NewsItem]) -> Result<()> {
        const BATCH_SIZE: usize = 100;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM articles").execute(&mut *tx).await?;

        for (chunk_index, chunk) in items.chunks(BATCH_SIZE).enumerate() {
            let offset = chunk_index * BATCH_SIZE;
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO articles (position, title, link, description, pub_date, author, \
                 source, source_name, image, categories) ",
            );

            builder.push_values(chunk.iter().enumerate(), |mut b, (i, item)| {
                let categories =
                    serde_json::to_string(&item.categories).unwrap_or_else(|_| "[]".to_string());
                b.push_bind((offset + i) as i64)
                    .push_bind(&item.title)
                    .push_bind(&item.link)
                    .push_bind(&item.description)
                    .push_bind(item.pub_date.to_rfc3339())
                    .push_bind(&item.author)
                    .push_bind(&item.source)
                    .push_bind(&item.source_name)
                    .push_bind(&item.image)
                    .push_bind(categories);
            });

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// The stored snapshot in listing order.
    pub async fn get_snapshot(&self) -> Result<Vec<NewsItem>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(
            r#"
            SELECT position, title, link, description, pub_date, author,
                   source, source_name, image, categories
            FROM articles
            ORDER BY position
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    _position,
                    title,
                    link,
                    description,
                    pub_date,
                    author,
                    source,
                    source_name,
                    image,
                    categories,
                )| NewsItem {
                    title,
                    link,
                    description,
                    pub_date: parse_pub_date(Some(&pub_date)),
                    author,
                    source,
                    source_name,
                    image,
                    categories: serde_json::from_str(&categories).unwrap_or_default(),
                },
            )
            .collect())
    }

    /// Link of the snapshot article at 0-based `position`.
    pub async fn snapshot_link_at(&self, position: usize) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT link FROM articles WHERE position = ?")
            .bind(position as i64)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(link,)| link))
    }
}
