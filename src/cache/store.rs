//! In-memory cache store for upstream JSON payloads
//!
//! Provides a `CacheStore` that maps cache keys to opaque `serde_json::Value`
//! payloads stamped with the time they were stored. The store never looks
//! inside a payload, so one store serves every endpoint.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Default time-to-live for cached payloads (one hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// A single cached payload
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The upstream response body, verbatim
    payload: Value,
    /// When the payload was stored
    cached_at: DateTime<Utc>,
}

/// Thread-safe TTL cache for upstream responses
///
/// Holds at most one entry per key. `set` replaces the entry wholesale and
/// `get` only returns payloads younger than the TTL. Stale entries stay in the
/// map until they are overwritten or the store is cleared.
#[derive(Debug)]
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl CacheStore {
    /// Creates an empty store applying `ttl` uniformly to every key
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the TTL applied to every entry
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the payload stored for `key` if it is still fresh
    ///
    /// An entry is fresh while `now - cached_at < ttl`. Missing and expired
    /// entries both yield `None`; expired entries are left in place.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;

        if self.is_fresh(entry, Utc::now()) {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Stores `payload` under `key` stamped with the current time
    ///
    /// Any previous entry for the key is replaced.
    pub fn set(&self, key: impl Into<String>, payload: Value) {
        self.insert(key.into(), payload, Utc::now());
    }

    /// Drops every entry, fresh or stale
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, including expired ones
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true when nothing has been stored yet (or since the last clear)
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn insert(&self, key: String, payload: Value, cached_at: DateTime<Utc>) {
        self.entries
            .write()
            .insert(key, CacheEntry { payload, cached_at });
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        // A negative age (wall clock stepped backwards) converts to Err and
        // counts as fresh.
        match now.signed_duration_since(entry.cached_at).to_std() {
            Ok(age) => age < self.ttl,
            Err(_) => true,
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
