use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage errors with operator-friendly messages
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another bridge process holds the database lock
    #[error("Database is locked by another websub-bridge process")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StorageError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return StorageError::InstanceLocked;
        }
        StorageError::Other(err)
    }
}

// SQLITE_BUSY (5): database is locked
// SQLITE_LOCKED (6): database table is locked
// SQLITE_CANTOPEN (14): unable to open database file
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Records
// ============================================================================

/// One published entry, as journaled after a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub entry_id: String,
    pub topic: String,
    pub published_at: DateTime<Utc>,
}

/// A verified hub subscription and its lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub subscribed_at: DateTime<Utc>,
    /// `None` when the hub did not send `hub.lease_seconds`.
    pub lease_expires: Option<DateTime<Utc>>,
}

// ============================================================================
// Helper Types
// ============================================================================

/// Row type for posts queries: (entry_id, topic, published_at)
pub(crate) type PostRow = (String, String, i64);

/// Row type for subscriptions queries: (topic, subscribed_at, lease_expires)
pub(crate) type SubscriptionRow = (String, i64, Option<i64>);

/// Unix seconds to UTC, clamping out-of-range values to the epoch.
pub(crate) fn from_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

impl From<PostRow> for PostRecord {
    fn from((entry_id, topic, published_at): PostRow) -> Self {
        Self {
            entry_id,
            topic,
            published_at: from_timestamp(published_at),
        }
    }
}

impl From<SubscriptionRow> for Subscription {
    fn from((topic, subscribed_at, lease_expires): SubscriptionRow) -> Self {
        Self {
            topic,
            subscribed_at: from_timestamp(subscribed_at),
            lease_expires: lease_expires.map(from_timestamp),
        }
    }
}
