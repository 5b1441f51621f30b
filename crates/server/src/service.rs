//! HTTP service implementation

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use ftso_core::{AppConfig, Asset, PriceQuote};
use ftso_price_feed::{FeedPoller, OracleFeed, PollerConfig, PriceAggregator};

use crate::conversions::{ApiError, ApiResult, HealthResponse, HistoryResponse, PriceQuery};

/// Service state
pub struct ServiceState {
    pub aggregator: Arc<PriceAggregator>,
    pub feed: Arc<OracleFeed>,
    pub poller: Mutex<Option<FeedPoller>>,
    pub start_time: Instant,
}

/// HTTP service wrapping both resolvers
#[derive(Clone)]
pub struct PriceServiceImpl {
    state: Arc<ServiceState>,
}

impl PriceServiceImpl {
    pub fn new(aggregator: Arc<PriceAggregator>, feed: Arc<OracleFeed>) -> Self {
        Self::with_poller(aggregator, feed, None)
    }

    pub fn with_poller(
        aggregator: Arc<PriceAggregator>,
        feed: Arc<OracleFeed>,
        poller: Option<FeedPoller>,
    ) -> Self {
        let state = ServiceState {
            aggregator,
            feed,
            poller: Mutex::new(poller),
            start_time: Instant::now(),
        };

        Self {
            state: Arc::new(state),
        }
    }

    /// Build resolvers and the poller from configuration
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let aggregator = Arc::new(PriceAggregator::new(&config.resolver)?);
        let feed = Arc::new(OracleFeed::new(&config.feed)?);

        let poller = config
            .feed
            .poller_enabled
            .then(|| FeedPoller::new(PollerConfig::from(&config.feed), Arc::clone(&feed)));

        Ok(Self::with_poller(aggregator, feed, poller))
    }

    /// Start background polling if configured
    pub async fn start(&self) -> anyhow::Result<()> {
        let mut poller = self.state.poller.lock().await;

        if let Some(ref mut poller) = *poller {
            poller.start()?;
            info!("Feed poller started");
        }

        Ok(())
    }

    /// Stop background polling
    pub async fn stop(&self) {
        let mut poller = self.state.poller.lock().await;

        if let Some(ref mut poller) = *poller {
            poller.stop().await;
        }

        info!("All services stopped");
    }

    pub fn aggregator(&self) -> &PriceAggregator {
        &self.state.aggregator
    }

    pub fn feed(&self) -> &OracleFeed {
        &self.state.feed
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/prices", get(get_price))
            .route("/api/feed/:asset", get(get_feed_quote))
            .route("/api/feed/:asset/refresh", post(refresh_feed))
            .route("/api/feed/:asset/history", get(get_feed_history))
            .route("/health", get(health))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.clone())
    }

    fn feed_asset(&self, symbol: &str) -> ApiResult<Asset> {
        Asset::from_symbol(symbol)
            .filter(|asset| self.state.feed.supports(*asset))
            .ok_or_else(|| ApiError::not_found(format!("No oracle feed for {}", symbol.to_uppercase())))
    }
}

/// Best available quote; always 200, degraded quotes carry `source: "Fallback"`
async fn get_price(
    State(service): State<PriceServiceImpl>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<PriceQuote> {
    let query = PriceQuery::from_pairs(pairs);
    Json(service.aggregator().resolve(query.asset.as_deref()).await)
}

/// Last feed quote, refreshing once if the asset was never read
async fn get_feed_quote(
    State(service): State<PriceServiceImpl>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<PriceQuote>> {
    let asset = service.feed_asset(&symbol)?;

    if let Some(quote) = service.feed().last_quote(asset) {
        return Ok(Json(quote));
    }

    debug!(asset = %asset, "No feed quote yet, refreshing");
    Ok(Json(service.feed().refresh(asset).await))
}

async fn refresh_feed(
    State(service): State<PriceServiceImpl>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<PriceQuote>> {
    let asset = service.feed_asset(&symbol)?;
    Ok(Json(service.feed().refresh(asset).await))
}

async fn get_feed_history(
    State(service): State<PriceServiceImpl>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let asset = service.feed_asset(&symbol)?;
    let feed = service.feed();

    Ok(Json(HistoryResponse::new(
        asset,
        feed.last_update_time(asset),
        feed.history(asset),
    )))
}

async fn health(State(service): State<PriceServiceImpl>) -> Json<HealthResponse> {
    let poller_running = service
        .state
        .poller
        .lock()
        .await
        .as_ref()
        .map(FeedPoller::is_running)
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: service.state.start_time.elapsed().as_secs(),
        poller_running,
        feed_assets: service.feed().assets(),
        resolver: service.aggregator().stats().into(),
    })
}
