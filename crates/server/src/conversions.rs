//! Conversions between internal types and HTTP response bodies

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use ftso_core::{Asset, HistoryPoint};
use ftso_price_feed::AggregatorStats;

/// `?asset=` query of the price endpoint
#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub asset: Option<String>,
}

impl PriceQuery {
    /// First `asset` pair wins; other keys and repeats are ignored
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let asset = pairs
            .into_iter()
            .find(|(key, _)| key == "asset")
            .map(|(_, value)| value);
        Self { asset }
    }
}

/// Rolling history of one feed asset
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub asset: Asset,
    pub symbol: String,
    pub last_update: u64,
    pub points: Vec<HistoryPoint>,
}

impl HistoryResponse {
    pub fn new(asset: Asset, last_update: u64, points: Vec<HistoryPoint>) -> Self {
        Self {
            asset,
            symbol: asset.pair(),
            last_update,
            points,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCounts {
    pub on_chain: u64,
    pub market: u64,
    pub fallback: u64,
}

impl From<AggregatorStats> for TierCounts {
    fn from(stats: AggregatorStats) -> Self {
        Self {
            on_chain: stats.on_chain,
            market: stats.market,
            fallback: stats.fallback,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub poller_running: bool,
    pub feed_assets: Vec<Asset>,
    pub resolver: TierCounts,
}

/// JSON error body with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
