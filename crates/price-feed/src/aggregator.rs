//! Multi-source price resolver - on-chain oracle, market data API, constants

use alloy_primitives::{Address, Bytes};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use ftso_core::{now_ms, Asset, FetchError, FetchResult, PriceQuote, QuoteSource, ResolverConfig};

use crate::contracts::price_selector;
use crate::decode::decode_packed_reading;
use crate::feeds::{CoinGeckoClient, JsonRpcTransport, OracleTransport, SpotPriceSource};

/// Asset used when a request names none
pub const DEFAULT_ASSET: Asset = Asset::Btc;

/// CoinGecko coin ids
pub fn coingecko_id(asset: Asset) -> Option<&'static str> {
    match asset {
        Asset::Btc => Some("bitcoin"),
        Asset::Eth => Some("ethereum"),
        Asset::Xrp => Some("ripple"),
        Asset::Flr => None,
    }
}

/// Last known good prices, served when every live source fails
pub fn fallback_price(asset: Asset) -> Option<f64> {
    match asset {
        Asset::Btc => Some(104_000.0),
        Asset::Eth => Some(3_900.0),
        Asset::Xrp => Some(2.35),
        Asset::Flr => None,
    }
}

/// Upper-cased request symbol, defaulting to [`DEFAULT_ASSET`]
pub fn normalize_symbol(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| DEFAULT_ASSET.symbol().to_string())
}

#[derive(Debug, Clone, Copy)]
struct CachedSpot {
    price: f64,
    fetched_at: Instant,
}

/// Per-tier answer counters
#[derive(Debug, Default)]
struct TierCounters {
    on_chain: AtomicU64,
    market: AtomicU64,
    fallback: AtomicU64,
}

/// Resolver statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorStats {
    pub on_chain: u64,
    pub market: u64,
    pub fallback: u64,
}

/// Server-side resolver trying each source in priority order
pub struct PriceAggregator {
    oracle: Arc<dyn OracleTransport>,
    contract: Address,
    market: Arc<dyn SpotPriceSource>,
    cache_ttl: Duration,
    spot_cache: DashMap<Asset, CachedSpot>,
    counters: TierCounters,
}

impl PriceAggregator {
    pub fn new(config: &ResolverConfig) -> anyhow::Result<Self> {
        let oracle = JsonRpcTransport::from_config(&config.oracle)?;
        let market = CoinGeckoClient::new(&config.market_data)?;

        Ok(Self::with_sources(
            Arc::new(oracle),
            config.oracle.contract_address,
            Arc::new(market),
            Duration::from_millis(config.market_data.cache_ttl_ms),
        ))
    }

    pub fn with_sources(
        oracle: Arc<dyn OracleTransport>,
        contract: Address,
        market: Arc<dyn SpotPriceSource>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            oracle,
            contract,
            market,
            cache_ttl,
            spot_cache: DashMap::new(),
            counters: TierCounters::default(),
        }
    }

    /// Resolve the best available quote. Never fails: the worst case is the
    /// fallback table (price 0 for unknown symbols).
    pub async fn resolve(&self, symbol: Option<&str>) -> PriceQuote {
        let symbol = normalize_symbol(symbol);
        let asset = Asset::from_symbol(&symbol);

        info!(asset = %symbol, "Price request");

        match self.fetch_on_chain(&symbol, asset).await {
            Ok(quote) => {
                self.counters.on_chain.fetch_add(1, Ordering::Relaxed);
                return quote;
            }
            Err(e) => warn!(asset = %symbol, kind = e.kind(), error = %e, "Oracle failed, trying market data"),
        }

        match self.fetch_market(&symbol, asset).await {
            Ok(quote) => {
                self.counters.market.fetch_add(1, Ordering::Relaxed);
                return quote;
            }
            Err(e) => warn!(asset = %symbol, kind = e.kind(), error = %e, "Market data failed, using fallback"),
        }

        self.counters.fallback.fetch_add(1, Ordering::Relaxed);
        Self::fallback(&symbol, asset)
    }

    async fn fetch_on_chain(&self, symbol: &str, asset: Option<Asset>) -> FetchResult<PriceQuote> {
        let selector = asset
            .and_then(price_selector)
            .ok_or_else(|| FetchError::UnsupportedAsset(symbol.to_string()))?;

        debug!(asset = %symbol, selector = %selector, "Querying oracle");

        let data = self
            .oracle
            .eth_call(self.contract, Bytes::copy_from_slice(selector.as_slice()))
            .await?;
        let reading = decode_packed_reading(&data)?;
        let price = reading.checked_price()?;

        info!(
            asset = %symbol,
            price,
            exponent = reading.exponent,
            timestamp_ms = reading.timestamp_ms(),
            "Oracle price decoded"
        );

        Ok(PriceQuote::new(symbol, price, reading.timestamp_ms(), QuoteSource::OnChainOracle))
    }

    async fn fetch_market(&self, symbol: &str, asset: Option<Asset>) -> FetchResult<PriceQuote> {
        let (asset, coin_id) = asset
            .and_then(|a| coingecko_id(a).map(|id| (a, id)))
            .ok_or_else(|| FetchError::UnsupportedAsset(symbol.to_string()))?;

        if let Some(cached) = self.cached_spot(asset) {
            debug!(asset = %symbol, price = cached, "Market data served from cache");
            return Ok(PriceQuote::new(symbol, cached, now_ms(), QuoteSource::MarketAggregator));
        }

        let price = self.market.usd_price(coin_id).await?;
        self.spot_cache.insert(
            asset,
            CachedSpot {
                price,
                fetched_at: Instant::now(),
            },
        );

        info!(asset = %symbol, price, provider = self.market.name(), "Market data price");

        Ok(PriceQuote::new(symbol, price, now_ms(), QuoteSource::MarketAggregator))
    }

    fn cached_spot(&self, asset: Asset) -> Option<f64> {
        self.spot_cache
            .get(&asset)
            .filter(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.price)
    }

    fn fallback(symbol: &str, asset: Option<Asset>) -> PriceQuote {
        let price = asset.and_then(fallback_price).unwrap_or(0.0);
        PriceQuote::new(symbol, price, now_ms(), QuoteSource::Fallback)
    }

    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            on_chain: self.counters.on_chain.load(Ordering::Relaxed),
            market: self.counters.market.load(Ordering::Relaxed),
            fallback: self.counters.fallback.load(Ordering::Relaxed),
        }
    }
}
