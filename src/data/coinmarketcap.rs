//! CoinMarketCap API client with response caching
//!
//! Forwards market data requests to the CoinMarketCap Pro API and keeps each
//! successful JSON response in a shared `CacheStore`, so repeated requests
//! within the TTL never reach the upstream provider.

use super::{cache_key, Endpoint, QueryParams};
use crate::cache::CacheStore;
use crate::cli::ProxyConfig;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Header carrying the CoinMarketCap API credential
pub const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// Default CoinMarketCap Pro API base URL
pub const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com";

/// Errors that can occur when fetching market data
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Connection, DNS or timeout failure talking to the provider
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status
    #[error("Upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The provider answered 2xx with a body that is not JSON
    #[error("Upstream returned invalid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Client for the CoinMarketCap `/v1/cryptocurrency` API family
///
/// Every request goes through [`CoinMarketCapClient::fetch_with_cache`]. Two
/// concurrent misses for the same key are not coalesced: both go upstream
/// and the last response written wins.
pub struct CoinMarketCapClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Cache shared by all endpoints
    cache: Arc<CacheStore>,
    /// Base URL for the API, without trailing slash (override for testing)
    base_url: String,
    /// Credential sent with every upstream request
    api_key: SecretString,
}

impl CoinMarketCapClient {
    /// Creates a client with a default HTTP client
    pub fn new(base_url: impl Into<String>, api_key: SecretString, cache: Arc<CacheStore>) -> Self {
        Self::with_http_client(Client::new(), base_url.into(), api_key, cache)
    }

    /// Creates a client from the proxy configuration
    ///
    /// Applies the configured upstream timeout to the HTTP client.
    pub fn from_config(config: &ProxyConfig, cache: Arc<CacheStore>) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self::with_http_client(
            http_client,
            config.base_url.clone(),
            config.api_key.clone(),
            cache,
        ))
    }

    fn with_http_client(
        http_client: Client,
        base_url: String,
        api_key: SecretString,
        cache: Arc<CacheStore>,
    ) -> Self {
        Self {
            http_client,
            cache,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Latest listings, defaulting to `start=1&limit=100&convert=USD`
    pub async fn listings(&self, params: QueryParams) -> Result<Value, FetchError> {
        self.fetch_with_cache(Endpoint::Listings, params).await
    }

    /// Coin metadata, parameters forwarded as-is
    pub async fn info(&self, params: QueryParams) -> Result<Value, FetchError> {
        self.fetch_with_cache(Endpoint::Info, params).await
    }

    /// Latest quotes, parameters forwarded as-is
    pub async fn quotes(&self, params: QueryParams) -> Result<Value, FetchError> {
        self.fetch_with_cache(Endpoint::Quotes, params).await
    }

    /// Historical OHLCV, parameters forwarded as-is
    pub async fn historical(&self, params: QueryParams) -> Result<Value, FetchError> {
        self.fetch_with_cache(Endpoint::Historical, params).await
    }

    /// Fetches an endpoint, serving fresh cached responses when available
    ///
    /// # Behavior
    /// - Applies the endpoint's parameter defaults, then derives the cache key
    /// - Returns the cached payload on a fresh hit without calling upstream
    /// - On a miss, fetches from the API and caches the response
    /// - On failure nothing is cached and expired data is never returned
    pub async fn fetch_with_cache(
        &self,
        endpoint: Endpoint,
        params: QueryParams,
    ) -> Result<Value, FetchError> {
        let params = endpoint.prepare_params(params);
        let key = cache_key(endpoint, &params);

        if let Some(payload) = self.cache.get(&key) {
            debug!(%endpoint, %key, "cache hit");
            return Ok(payload);
        }

        debug!(%endpoint, %key, "cache miss, fetching from CoinMarketCap");
        let payload = match self.fetch_from_api(endpoint, &params).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%endpoint, %key, error = %e, "upstream fetch failed");
                return Err(e);
            }
        };

        self.cache.set(key, payload.clone());
        Ok(payload)
    }

    /// Fetches an endpoint directly from the API
    async fn fetch_from_api(
        &self,
        endpoint: Endpoint,
        params: &QueryParams,
    ) -> Result<Value, FetchError> {
        let url = format!("{}/v1/cryptocurrency/{}", self.base_url, endpoint.path());

        let response = self
            .http_client
            .get(&url)
            .query(params)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status { status, body });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl fmt::Debug for CoinMarketCapClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoinMarketCapClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}
