use std::collections::HashSet;

use anyhow::Result;

use super::schema::Database;
use super::types::LinkList;

impl Database {
    // ========================================================================
    // Saved / Ignored Link Operations
    // ========================================================================

    /// Add `link` to `list`. Returns `false` if it was already present.
    pub async fn add_link(&self, list: LinkList, link: &str) -> Result<bool> {
        let result = sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (link) VALUES (?)",
            list.table()
        ))
        .bind(link)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove `link` from `list`. Returns `false` if it was not present.
    pub async fn remove_link(&self, list: LinkList, link: &str) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE link = ?", list.table()))
            .bind(link)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn contains_link(&self, list: LinkList, link: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as(&format!("SELECT 1 FROM {} WHERE link = ?", list.table()))
                .bind(link)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    /// All links in `list`, oldest first.
    pub async fn list_links(&self, list: LinkList) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT link FROM {} ORDER BY rowid", list.table()))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(link,)| link).collect())
    }

    /// Drop every link in `list` that is not in `keep`.
    ///
    /// Nothing is written when all links are kept. Returns the number removed.
    pub async fn retain_links(&self, list: LinkList, keep: &HashSet<&str>) -> Result<u64> {
        let stale: Vec<String> = self
            .list_links(list)
            .await?
            .into_iter()
            .filter(|link| !keep.contains(link.as_str()))
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        let sql = format!("DELETE FROM {} WHERE link = ?", list.table());
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for link in &stale {
            removed += sqlx::query(&sql)
                .bind(link)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(removed)
    }

    /// Remove every link from `list`. Returns the number removed.
    pub async fn clear_links(&self, list: LinkList) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {}", list.table()))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
