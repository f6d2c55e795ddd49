//! Market data routes
//!
//! One GET handler per upstream endpoint, each forwarding its query string to
//! the caching client and returning the upstream JSON verbatim.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::Value;

use super::AppState;
use crate::data::{Endpoint, FetchError, QueryParams};

/// JSON body of a failed request
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error returned by the market data handlers
///
/// Every fetch failure is reported as `500` with `{"error": "<description>"}`.
#[derive(Debug)]
pub struct ApiError(pub FetchError);

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Routes mounted under `/api/coins`, one per upstream endpoint
pub(super) fn coin_routes() -> Router<AppState> {
    Router::new()
        .route("/listings/latest", get(listings))
        .route("/info", get(info))
        .route("/quotes/latest", get(quotes))
        .route("/ohlcv/historical", get(historical))
}

// Example: GET /api/coins/listings/latest?start=1&limit=100&convert=USD
async fn listings(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, ApiError> {
    proxy(&state, Endpoint::Listings, params).await
}

// Example: GET /api/coins/info?symbol=BTC,ETH
async fn info(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, ApiError> {
    proxy(&state, Endpoint::Info, params).await
}

// Example: GET /api/coins/quotes/latest?symbol=BTC
async fn quotes(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, ApiError> {
    proxy(&state, Endpoint::Quotes, params).await
}

// Example: GET /api/coins/ohlcv/historical?symbol=BTC&time_start=...&interval=daily
async fn historical(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, ApiError> {
    proxy(&state, Endpoint::Historical, params).await
}

async fn proxy(
    state: &AppState,
    endpoint: Endpoint,
    params: QueryParams,
) -> Result<Json<Value>, ApiError> {
    let payload = state.client.fetch_with_cache(endpoint, params).await?;
    Ok(Json(payload))
}
