//! Bounded memory of recently published entry ids.
//!
//! The tracker is the only shared mutable state on the notification path.
//! Hubs deliver at least once, and a feed update re-delivers the same entry
//! id, so every entry is claimed here before it is published.
//!
//! # Eviction
//!
//! - **Capacity**: once more than `capacity` ids are tracked, the least
//!   recently recorded ones are dropped first.
//! - **Retention** (optional): ids recorded longer ago than the retention
//!   window are dropped whenever a new id is recorded, and are no longer
//!   reported as seen even before that.
//!
//! Neither is ever surfaced as an error.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;

/// Default number of ids remembered.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Recently published entry ids with the time each was recorded.
///
/// Created once at startup and shared by reference (`Arc`) with the
/// callback handler. All operations take a short internal lock, so
/// [`claim`](Self::claim) is atomic with respect to concurrent deliveries of
/// the same id.
pub struct DedupTracker {
    entries: Mutex<LruCache<String, DateTime<Utc>>>,
    retention: Option<Duration>,
}

impl DedupTracker {
    /// Creates an empty tracker.
    ///
    /// `retention` of `None` disables time-based eviction.
    pub fn new(capacity: NonZeroUsize, retention: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            retention,
        }
    }

    /// Tracker with [`DEFAULT_CAPACITY`] and no retention window.
    pub fn with_default_capacity() -> Self {
        Self::new(
            NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            None,
        )
    }

    /// Returns true if `id` was recorded and has not been evicted or expired.
    ///
    /// Pure lookup: does not refresh the id or evict anything.
    pub fn seen(&self, id: &str) -> bool {
        let entries = self.lock();
        entries
            .peek(id)
            .is_some_and(|recorded| !self.is_expired(*recorded, Utc::now()))
    }

    /// Records `id` as published at `at`, then evicts by retention.
    ///
    /// Recording an id again moves it to the newest position with the new
    /// timestamp. Capacity eviction happens inside the LRU on insert.
    pub fn record(&self, id: &str, at: DateTime<Utc>) {
        let mut entries = self.lock();
        entries.put(id.to_string(), at);
        self.evict_expired(&mut entries, at);
    }

    /// Atomically checks and records `id`.
    ///
    /// Returns `true` if the caller now owns the id (it was not seen, and is
    /// recorded as of `at`), `false` if it was already claimed or published.
    /// A caller that fails to publish must hand the id back with
    /// [`release`](Self::release).
    pub fn claim(&self, id: &str, at: DateTime<Utc>) -> bool {
        let mut entries = self.lock();
        self.evict_expired(&mut entries, at);
        if entries
            .peek(id)
            .is_some_and(|recorded| !self.is_expired(*recorded, at))
        {
            return false;
        }
        entries.put(id.to_string(), at);
        true
    }

    /// Forgets `id`, so a later delivery can publish it again.
    pub fn release(&self, id: &str) -> bool {
        self.lock().pop(id).is_some()
    }

    /// Number of ids currently tracked (including not-yet-evicted expired ones).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn is_expired(&self, recorded: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.retention
            .is_some_and(|retention| now.signed_duration_since(recorded) > retention)
    }

    /// Pops from the oldest end while the oldest id is past retention.
    fn evict_expired(&self, entries: &mut LruCache<String, DateTime<Utc>>, now: DateTime<Utc>) {
        if self.retention.is_none() {
            return;
        }
        let mut evicted = 0usize;
        while let Some((_, recorded)) = entries.peek_lru() {
            if !self.is_expired(*recorded, now) {
                break;
            }
            entries.pop_lru();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(evicted, remaining = entries.len(), "Expired dedup entries");
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, DateTime<Utc>>> {
        // Every mutation is a single LRU call; poisoning is ignored.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DedupTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupTracker")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("retention", &self.retention)
            .finish()
    }
}
