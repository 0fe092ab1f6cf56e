//! Optional SQLite store: published-post journal and subscription leases.
mod posts;
mod schema;
mod subscriptions;
mod types;

pub use schema::Database;
pub use types::{PostRecord, StorageError, Subscription};
