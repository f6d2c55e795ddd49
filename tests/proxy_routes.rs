//! End-to-end tests for the proxy routes
//!
//! Starts a stub CoinMarketCap API and a proxy pointed at it, both on
//! ephemeral local ports, and drives the proxy with a real HTTP client.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};

use coinproxy::cache::CacheStore;
use coinproxy::cli::{Cli, ProxyConfig};
use coinproxy::data::{CoinMarketCapClient, API_KEY_HEADER};
use coinproxy::server::{self, AppState};

/// Requests observed by the stub upstream
#[derive(Clone, Default)]
struct Upstream {
    fail: bool,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(String, BTreeMap<String, String>, Option<String>)>>>,
}

impl Upstream {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> (String, BTreeMap<String, String>, Option<String>) {
        self.requests.lock().last().cloned().expect("No upstream request recorded")
    }
}

fn btc_info() -> Value {
    json!({
        "status": { "error_code": 0 },
        "data": { "BTC": { "id": 1, "name": "Bitcoin", "symbol": "BTC", "logo": "https://s2.coinmarketcap.com/1.png" } }
    })
}

async fn upstream_handler(
    State(upstream): State<Upstream>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
) -> Response {
    upstream.hits.fetch_add(1, Ordering::SeqCst);
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    upstream
        .requests
        .lock()
        .push((uri.path().to_string(), query, api_key));

    if upstream.fail {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": { "error_code": 1001, "error_message": "This API Key is invalid." } })),
        )
            .into_response();
    }
    Json(btc_info()).into_response()
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn start_upstream(fail: bool) -> (SocketAddr, Upstream) {
    let upstream = Upstream {
        fail,
        ..Default::default()
    };
    let router = Router::new()
        .route("/v1/cryptocurrency/listings/latest", get(upstream_handler))
        .route("/v1/cryptocurrency/info", get(upstream_handler))
        .route("/v1/cryptocurrency/quotes/latest", get(upstream_handler))
        .route("/v1/cryptocurrency/ohlcv/historical", get(upstream_handler))
        .with_state(upstream.clone());
    (spawn(router).await, upstream)
}

/// Starts a proxy configured the same way `main` does, returning its base URL
async fn start_proxy(upstream: SocketAddr) -> (String, Arc<CacheStore>) {
    let base_url = format!("http://{upstream}");
    let cli = Cli::parse_from(["coinproxy", "--api-key", "integration-key", "--base-url", &base_url]);
    let config = ProxyConfig::from_cli(&cli).unwrap();

    let cache = Arc::new(CacheStore::new(config.cache_ttl));
    let client = CoinMarketCapClient::from_config(&config, Arc::clone(&cache)).unwrap();
    let addr = spawn(server::build_router(AppState::new(client))).await;

    (format!("http://{addr}/api/coins"), cache)
}

#[tokio::test]
async fn test_info_end_to_end_hits_upstream_once() {
    let (upstream_addr, upstream) = start_upstream(false).await;
    let (proxy, _cache) = start_proxy(upstream_addr).await;
    let http = reqwest::Client::new();

    let first = http.get(format!("{proxy}/info?symbol=BTC")).send().await.unwrap();
    assert_eq!(first.status(), 200);
    let first: Value = first.json().await.unwrap();

    let second = http.get(format!("{proxy}/info?symbol=BTC")).send().await.unwrap();
    assert_eq!(second.status(), 200);
    let second: Value = second.json().await.unwrap();

    assert_eq!(first, btc_info());
    assert_eq!(second, first);
    assert_eq!(upstream.hits(), 1);

    let (path, query, api_key) = upstream.last_request();
    assert_eq!(path, "/v1/cryptocurrency/info");
    assert_eq!(query.get("symbol").map(String::as_str), Some("BTC"));
    assert_eq!(api_key.as_deref(), Some("integration-key"));
}

#[tokio::test]
async fn test_listings_route_forwards_defaults() {
    let (upstream_addr, upstream) = start_upstream(false).await;
    let (proxy, _cache) = start_proxy(upstream_addr).await;

    let response = reqwest::get(format!("{proxy}/listings/latest")).await.unwrap();
    assert_eq!(response.status(), 200);

    let (path, query, _) = upstream.last_request();
    assert_eq!(path, "/v1/cryptocurrency/listings/latest");
    let expected: BTreeMap<String, String> = [("start", "1"), ("limit", "100"), ("convert", "USD")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(query, expected);
}

#[tokio::test]
async fn test_param_order_does_not_split_cache() {
    let (upstream_addr, upstream) = start_upstream(false).await;
    let (proxy, cache) = start_proxy(upstream_addr).await;

    reqwest::get(format!("{proxy}/ohlcv/historical?symbol=BTC&interval=daily"))
        .await
        .unwrap();
    reqwest::get(format!("{proxy}/ohlcv/historical?interval=daily&symbol=BTC"))
        .await
        .unwrap();

    assert_eq!(upstream.hits(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_each_route_reaches_its_upstream_path() {
    let (upstream_addr, upstream) = start_upstream(false).await;
    let (proxy, cache) = start_proxy(upstream_addr).await;

    for (route, upstream_path) in [
        ("listings/latest", "/v1/cryptocurrency/listings/latest"),
        ("info", "/v1/cryptocurrency/info"),
        ("quotes/latest", "/v1/cryptocurrency/quotes/latest"),
        ("ohlcv/historical", "/v1/cryptocurrency/ohlcv/historical"),
    ] {
        let response = reqwest::get(format!("{proxy}/{route}?symbol=ETH")).await.unwrap();
        assert_eq!(response.status(), 200, "{route} should succeed");
        assert_eq!(upstream.last_request().0, upstream_path);
    }

    assert_eq!(upstream.hits(), 4);
    assert_eq!(cache.len(), 4);
}

#[tokio::test]
async fn test_upstream_failure_is_500_with_error_body() {
    let (upstream_addr, upstream) = start_upstream(true).await;
    let (proxy, cache) = start_proxy(upstream_addr).await;

    let response = reqwest::get(format!("{proxy}/quotes/latest?symbol=BTC")).await.unwrap();
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.unwrap();
    let error = body["error"].as_str().expect("error should be a string");
    assert!(error.contains("401"), "Unexpected error: {error}");
    assert!(error.contains("This API Key is invalid."));
    assert!(cache.is_empty(), "Failures must not be cached");

    // A retry goes upstream again
    reqwest::get(format!("{proxy}/quotes/latest?symbol=BTC")).await.unwrap();
    assert_eq!(upstream.hits(), 2);
}

#[tokio::test]
async fn test_unreachable_upstream_is_500() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);
    let (proxy, _cache) = start_proxy(closed).await;

    let response = reqwest::get(format!("{proxy}/info?symbol=BTC")).await.unwrap();
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("HTTP request failed"));
}

#[tokio::test]
async fn test_repeated_query_name_forwards_last_value() {
    let (upstream_addr, upstream) = start_upstream(false).await;
    let (proxy, cache) = start_proxy(upstream_addr).await;

    let response = reqwest::get(format!("{proxy}/info?symbol=BTC&symbol=ETH")).await.unwrap();
    assert_eq!(response.status(), 200);

    let (_, query, _) = upstream.last_request();
    assert_eq!(query.get("symbol").map(String::as_str), Some("ETH"));
    assert_eq!(query.len(), 1);

    // Same slot as asking for ETH directly
    reqwest::get(format!("{proxy}/info?symbol=ETH")).await.unwrap();
    assert_eq!(upstream.hits(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let (upstream_addr, _upstream) = start_upstream(false).await;
    let (proxy, _cache) = start_proxy(upstream_addr).await;

    let response = reqwest::Client::new()
        .get(format!("{proxy}/info?symbol=BTC"))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (upstream_addr, upstream) = start_upstream(false).await;
    let (proxy, _cache) = start_proxy(upstream_addr).await;

    let response = reqwest::get(format!("{proxy}/map")).await.unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(upstream.hits(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_misses_all_succeed() {
    let (upstream_addr, upstream) = start_upstream(false).await;
    let (proxy, cache) = start_proxy(upstream_addr).await;
    let http = reqwest::Client::new();

    let responses = join_all((0..8).map(|_| {
        let http = http.clone();
        let url = format!("{proxy}/quotes/latest?symbol=SOL");
        async move { http.get(url).send().await.unwrap().status() }
    }))
    .await;

    assert!(responses.iter().all(|status| *status == 200));
    // Concurrent misses are not coalesced, but they all land in one slot
    let hits = upstream.hits();
    assert!((1..=8).contains(&hits), "Unexpected upstream hits: {hits}");
    assert_eq!(cache.len(), 1);
}
