use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_message, StorageError};

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("connections", &self.pool.size())
            .finish()
    }
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens a private in-memory database (used by tests and
    /// when the journal is only wanted for the lifetime of the process).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InstanceLocked` if another bridge process
    /// has the database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `StorageError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // SEC-010: Set database file permissions BEFORE pool creation
        // Ensures no window where the file exists with default umask permissions
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::PermissionsExt;
            let db_path = std::path::Path::new(path);
            if db_path.exists() {
                let perms = std::fs::Permissions::from_mode(0o600);
                if let Err(e) = std::fs::set_permissions(path, perms) {
                    tracing::warn!(path = %path, error = %e, "SEC-010: Failed to set database file permissions");
                }
            } else if let Some(parent) = db_path.parent() {
                if parent.exists() {
                    use std::os::unix::fs::OpenOptionsExt;
                    let _file = std::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .mode(0o600)
                        .open(db_path)
                        .ok(); // If creation fails, SQLite will report the error at connect_with.
                }
            }
        }

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release before returning SQLITE_BUSY.
        // Using pragma() ensures all connections in the pool inherit this setting.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StorageError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // SQLite is single-writer; journal writes come from delivery tasks and
        // lease writes from verification requests.
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StorageError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if is_lock_message(&e.to_string()) {
                StorageError::InstanceLocked
            } else {
                StorageError::Migration(e.to_string())
            }
        })?;
        tracing::debug!(path = %path, "Opened database");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All migrations use `IF NOT EXISTS` for idempotency, so re-running on
    /// an existing database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Journal of published entries, one row per entry id
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                entry_id TEXT PRIMARY KEY,
                topic TEXT NOT NULL,
                published_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Replay at startup reads the newest rows first
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // Verified hub subscriptions and their lease expiry
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                topic TEXT PRIMARY KEY,
                subscribed_at INTEGER NOT NULL,
                lease_expires INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_subscriptions_expiry ON subscriptions(lease_expires)",
        )
        .execute(&mut *tx)
        .await?;

        // Commit all migrations atomically
        tx.commit().await?;

        Ok(())
    }
}
