//! Market data endpoints and request keying
//!
//! Describes the CoinMarketCap endpoints the proxy forwards, the defaults each
//! one applies to its query parameters, and how a request maps onto a cache key.

pub mod coinmarketcap;

use std::collections::BTreeMap;
use std::fmt;

pub use coinmarketcap::{CoinMarketCapClient, FetchError, API_KEY_HEADER};

/// Query parameters forwarded upstream
///
/// A sorted map, so two logically equal parameter sets always iterate (and
/// therefore encode) in the same order no matter how the caller built them.
/// Each name maps to one value: when a query string repeats a name
/// (`symbol=BTC&symbol=ETH`) the last occurrence wins. CoinMarketCap takes
/// lists as a single comma-separated value (`symbol=BTC,ETH`).
pub type QueryParams = BTreeMap<String, String>;

/// Parameters the listings endpoint forwards, with the value used when the
/// caller leaves one out or sends it empty
const LISTINGS_DEFAULTS: [(&str, &str); 3] = [("start", "1"), ("limit", "100"), ("convert", "USD")];

/// Logical endpoints exposed by the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Paginated list of active coins with latest market data
    Listings,
    /// Static metadata (logo, description, urls) per symbol or id
    Info,
    /// Latest price quotes per symbol or id
    Quotes,
    /// Historical OHLCV candles
    Historical,
}

impl Endpoint {
    /// All endpoints, in routing order
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Listings,
        Endpoint::Info,
        Endpoint::Quotes,
        Endpoint::Historical,
    ];

    /// Path below `/v1/cryptocurrency/` on the upstream API
    ///
    /// The proxy mounts its routes under the same relative paths.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Listings => "listings/latest",
            Endpoint::Info => "info",
            Endpoint::Quotes => "quotes/latest",
            Endpoint::Historical => "ohlcv/historical",
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Listings => "listings",
            Endpoint::Info => "info",
            Endpoint::Quotes => "quotes",
            Endpoint::Historical => "historical",
        }
    }

    /// Produces the exact parameter set this endpoint forwards upstream
    ///
    /// Listings only forwards `start`, `limit` and `convert`, filling in
    /// `1`, `100` and `USD` for any that are missing or empty. Every other
    /// endpoint forwards the caller's parameters untouched.
    pub fn prepare_params(&self, params: QueryParams) -> QueryParams {
        match self {
            Endpoint::Listings => LISTINGS_DEFAULTS
                .iter()
                .map(|(name, default)| {
                    let value = params
                        .get(*name)
                        .filter(|value| !value.is_empty())
                        .cloned()
                        .unwrap_or_else(|| default.to_string());
                    (name.to_string(), value)
                })
                .collect(),
            Endpoint::Info | Endpoint::Quotes | Endpoint::Historical => params,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds the cache key for a request
///
/// The key is the upstream path followed by the form-urlencoded query, e.g.
/// `listings/latest?convert=USD&limit=100&start=1`. Parameters are encoded in
/// key order, so equal parameter sets always produce equal keys and any
/// difference in names or values produces a different key.
pub fn cache_key(endpoint: Endpoint, params: &QueryParams) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    format!("{}?{}", endpoint.path(), query)
}
