use chrono::{DateTime, Duration, Utc};

use super::schema::Database;
use super::types::{StorageError, Subscription, SubscriptionRow};

impl Database {
    // ========================================================================
    // Subscription Lease Operations
    // ========================================================================

    /// Records a verified subscription. A later verification for the same
    /// topic replaces the lease.
    pub async fn upsert_subscription(
        &self,
        topic: &str,
        lease_seconds: Option<u64>,
        at: DateTime<Utc>,
    ) -> Result<Subscription, StorageError> {
        let lease_expires = lease_seconds
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
            .and_then(|lease| at.checked_add_signed(lease));

        sqlx::query(
            "INSERT INTO subscriptions (topic, subscribed_at, lease_expires) VALUES (?, ?, ?) \
             ON CONFLICT(topic) DO UPDATE SET \
                 subscribed_at = excluded.subscribed_at, \
                 lease_expires = excluded.lease_expires",
        )
        .bind(topic)
        .bind(at.timestamp())
        .bind(lease_expires.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(Subscription {
            topic: topic.to_string(),
            subscribed_at: DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at),
            lease_expires: lease_expires
                .map(|t| DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)),
        })
    }

    /// Removes a subscription. Returns false if none was recorded.
    pub async fn remove_subscription(&self, topic: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE topic = ?")
            .bind(topic)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_subscription(
        &self,
        topic: &str,
    ) -> Result<Option<Subscription>, StorageError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            "SELECT topic, subscribed_at, lease_expires FROM subscriptions WHERE topic = ?",
        )
        .bind(topic)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(row.map(Subscription::from))
    }

    /// Subscriptions whose lease ends before `now + within`, soonest first.
    ///
    /// Already-expired leases are included. Subscriptions without a lease
    /// never expire and are not returned.
    pub async fn expiring_subscriptions(
        &self,
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, StorageError> {
        let horizon = now.checked_add_signed(within).unwrap_or(now);
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            "SELECT topic, subscribed_at, lease_expires FROM subscriptions \
             WHERE lease_expires IS NOT NULL AND lease_expires < ? \
             ORDER BY lease_expires ASC",
        )
        .bind(horizon.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(rows.into_iter().map(Subscription::from).collect())
    }
}
