//! coinproxy library
//!
//! Exposes the cache, market data client, CLI and server modules for use by the
//! binary and integration tests.

pub mod cache;
pub mod cli;
pub mod data;
pub mod server;
