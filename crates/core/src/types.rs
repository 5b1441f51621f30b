//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::FetchError;

/// Assets with an FTSO price feed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    #[default]
    Btc,
    Eth,
    Xrp,
    Flr,
}

impl Asset {
    pub const ALL: [Asset; 4] = [Asset::Btc, Asset::Eth, Asset::Xrp, Asset::Flr];

    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Xrp => "XRP",
            Asset::Flr => "FLR",
        }
    }

    /// Trading pair label, e.g. `BTC/USD`
    pub fn pair(&self) -> String {
        pair_label(self.symbol())
    }

    /// Case-insensitive lookup
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|asset| asset.symbol().eq_ignore_ascii_case(symbol.trim()))
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Asset {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s).ok_or_else(|| FetchError::UnsupportedAsset(s.to_uppercase()))
    }
}

/// Pair label for an arbitrary (possibly unsupported) symbol
pub fn pair_label(symbol: &str) -> String {
    format!("{}/USD", symbol)
}

/// Which provider answered a price request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteSource {
    #[serde(rename = "FTSO")]
    OnChainOracle,
    #[serde(rename = "CoinGecko")]
    MarketAggregator,
    #[serde(rename = "Fallback")]
    Fallback,
    #[serde(rename = "Error")]
    Error,
    /// Served from feed state because a refresh was already in flight
    #[serde(rename = "Cache")]
    Cached,
}

impl QuoteSource {
    pub fn name(&self) -> &'static str {
        match self {
            QuoteSource::OnChainOracle => "FTSO",
            QuoteSource::MarketAggregator => "CoinGecko",
            QuoteSource::Fallback => "Fallback",
            QuoteSource::Error => "Error",
            QuoteSource::Cached => "Cache",
        }
    }
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Health classification of the latest feed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Healthy,
    Latency,
    Unavailable,
}

impl FeedStatus {
    pub fn name(&self) -> &'static str {
        match self {
            FeedStatus::Healthy => "healthy",
            FeedStatus::Latency => "latency",
            FeedStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of one price resolution attempt
///
/// The server resolver fills the base fields only. The oracle feed also sets
/// the change, status and raw reading fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub asset: String,
    pub price: f64,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    pub source: QuoteSource,
    pub symbol: String,
    #[serde(rename = "change24h", default, skip_serializing_if = "Option::is_none")]
    pub change_24h: Option<f64>,
    #[serde(rename = "changePercent24h", default, skip_serializing_if = "Option::is_none")]
    pub change_percent_24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_status: Option<FeedStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<String>,
}

impl PriceQuote {
    pub fn new(asset: impl Into<String>, price: f64, timestamp_ms: u64, source: QuoteSource) -> Self {
        let asset = asset.into();
        let symbol = pair_label(&asset);
        Self {
            asset,
            price,
            timestamp_ms,
            source,
            symbol,
            change_24h: None,
            change_percent_24h: None,
            feed_status: None,
            decimals: None,
            raw_value: None,
        }
    }

    pub fn with_change(mut self, change: f64, change_percent: f64) -> Self {
        self.change_24h = Some(change);
        self.change_percent_24h = Some(change_percent);
        self
    }

    pub fn with_feed_status(mut self, status: FeedStatus) -> Self {
        self.feed_status = Some(status);
        self
    }

    pub fn with_raw(mut self, decimals: i8, raw_value: impl Into<String>) -> Self {
        self.decimals = Some(decimals);
        self.raw_value = Some(raw_value.into());
        self
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }

    pub fn is_stale(&self, max_age_ms: u64, now_ms: u64) -> bool {
        self.age_ms(now_ms) > max_age_ms
    }
}

/// One sample of the rolling chart history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: u64,
    pub price: f64,
}

/// Wall clock in epoch milliseconds
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
