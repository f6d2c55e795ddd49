//! Command-line interface parsing for the coinproxy server
//!
//! Every option can also be supplied through an environment variable, so the
//! proxy can be configured entirely from its deployment environment.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::data::coinmarketcap::DEFAULT_BASE_URL;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The upstream base URL could not be parsed
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// A timeout of zero would fail every upstream request
    #[error("Upstream timeout must be greater than zero")]
    ZeroTimeout,
}

/// coinproxy - Caching proxy for CoinMarketCap market data
#[derive(Parser)]
#[command(name = "coinproxy")]
#[command(about = "Caching proxy for CoinMarketCap cryptocurrency market data")]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// CoinMarketCap API base URL
    #[arg(long, env = "CMC_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// CoinMarketCap API key, sent as the X-CMC_PRO_API_KEY header
    #[arg(long, env = "CMC_PRO_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// How long a cached response stays fresh, in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    /// Timeout for each upstream request, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,
}

/// Validated configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Socket address the HTTP server binds to
    pub bind_address: SocketAddr,
    /// Upstream base URL without trailing slash
    pub base_url: String,
    /// Upstream API credential
    pub api_key: SecretString,
    /// TTL applied to every cache entry
    pub cache_ttl: Duration,
    /// Per-request upstream timeout
    pub upstream_timeout: Duration,
}

impl ProxyConfig {
    /// Builds a ProxyConfig from parsed CLI arguments
    ///
    /// # Returns
    /// * `Ok(ProxyConfig)` with validated settings
    /// * `Err(CliError)` if the base URL is not http(s) or the timeout is zero
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let base_url = validate_base_url(&cli.base_url)?;

        if cli.upstream_timeout_secs == 0 {
            return Err(CliError::ZeroTimeout);
        }

        Ok(ProxyConfig {
            bind_address: SocketAddr::new(cli.host, cli.port),
            base_url,
            api_key: SecretString::from(cli.api_key.clone()),
            cache_ttl: Duration::from_secs(cli.cache_ttl_secs),
            upstream_timeout: Duration::from_secs(cli.upstream_timeout_secs),
        })
    }
}

/// Checks that `raw` is an absolute http(s) URL and strips any trailing slash
fn validate_base_url(raw: &str) -> Result<String, CliError> {
    let invalid = |reason: String| CliError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(raw.trim_end_matches('/').to_string()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}
