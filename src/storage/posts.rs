use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{PostRecord, PostRow, StorageError};

/// Maximum number of journal rows returned by any single query (OOM protection)
const MAX_POSTS: i64 = 1_000_000;

impl Database {
    // ========================================================================
    // Post Journal Operations
    // ========================================================================

    /// Journals a successful publish. Returns false if the id was already
    /// journaled (the first publish time is kept).
    pub async fn record_post(
        &self,
        entry_id: &str,
        topic: &str,
        published_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "INSERT INTO posts (entry_id, topic, published_at) VALUES (?, ?, ?) \
             ON CONFLICT(entry_id) DO NOTHING",
        )
        .bind(entry_id)
        .bind(topic)
        .bind(published_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn post_exists(&self, entry_id: &str) -> Result<bool, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM posts WHERE entry_id = ?")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(row.is_some())
    }

    /// The `limit` most recently published posts, oldest first.
    ///
    /// Oldest-first order lets the caller replay them into an LRU so the
    /// newest end up most recently used.
    pub async fn recent_posts(&self, limit: usize) -> Result<Vec<PostRecord>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(MAX_POSTS).min(MAX_POSTS);
        let rows: Vec<PostRow> = sqlx::query_as(
            "SELECT entry_id, topic, published_at FROM ( \
                 SELECT entry_id, topic, published_at FROM posts \
                 ORDER BY published_at DESC, rowid DESC LIMIT ? \
             ) ORDER BY published_at ASC",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    /// Deletes journal rows published before `cutoff`. Returns the number removed.
    pub async fn prune_posts(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM posts WHERE published_at < ?")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(result.rows_affected())
    }
}
