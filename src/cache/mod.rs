//! Cache module for keeping upstream responses in memory
//!
//! This module provides a cache store that remembers raw JSON responses under a
//! string key for a fixed TTL (time-to-live). Unlike a fallback cache, expired
//! entries are never served: they read as misses and get overwritten by the
//! next successful fetch.

mod store;

pub use store::{CacheStore, DEFAULT_TTL};
