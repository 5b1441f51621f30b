//! On-chain oracle feed with per-asset rolling history
//!
//! Each asset owns one slot guarded by its own lock, so a refresh commits
//! price, history and timestamp together and readers never see a partial
//! update. An in-flight flag per slot refuses overlapping refreshes.

use alloy_primitives::{Address, Bytes};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use ftso_core::{
    now_ms, Asset, FeedConfig, FeedStatus, FetchError, FetchResult, HistoryPoint, PriceQuote,
    QuoteSource,
};

use crate::contracts::{decode_feed_return, encode_feed_call, has_feed_accessor};
use crate::decode::OracleReading;
use crate::feeds::{JsonRpcTransport, OracleTransport};

/// Default rolling history length
pub const HISTORY_CAPACITY: usize = 60;

/// Exponent reported on failed reads
const FAILED_READ_DECIMALS: i8 = 7;

/// Mutable per-asset state
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolverState {
    last_price: f64,
    last_update_ms: u64,
    history: VecDeque<HistoryPoint>,
    last_quote: Option<PriceQuote>,
}

#[derive(Debug, Default)]
struct AssetSlot {
    state: RwLock<ResolverState>,
    in_flight: AtomicBool,
}

/// Clears the slot's in-flight flag on drop
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Client-side resolver reading the oracle only
pub struct OracleFeed {
    transport: Arc<dyn OracleTransport>,
    contract: Address,
    history_capacity: usize,
    slots: DashMap<Asset, Arc<AssetSlot>>,
}

impl OracleFeed {
    pub fn new(config: &FeedConfig) -> anyhow::Result<Self> {
        let transport = JsonRpcTransport::from_config(&config.oracle)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config.oracle.contract_address,
            config.history_capacity,
        ))
    }

    pub fn with_transport(
        transport: Arc<dyn OracleTransport>,
        contract: Address,
        history_capacity: usize,
    ) -> Self {
        let slots = DashMap::new();
        for asset in Asset::ALL.into_iter().filter(|a| has_feed_accessor(*a)) {
            slots.insert(asset, Arc::new(AssetSlot::default()));
        }

        Self {
            transport,
            contract,
            history_capacity: history_capacity.max(1),
            slots,
        }
    }

    /// Assets this feed can read
    pub fn assets(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.slots.iter().map(|e| *e.key()).collect();
        assets.sort();
        assets
    }

    pub fn supports(&self, asset: Asset) -> bool {
        self.slots.contains_key(&asset)
    }

    fn slot(&self, asset: Asset) -> Option<Arc<AssetSlot>> {
        self.slots.get(&asset).map(|r| Arc::clone(r.value()))
    }

    /// Read the oracle once and fold the result into the asset's state.
    ///
    /// Never fails. A failed read returns the previous price with status
    /// `unavailable` and leaves state untouched.
    pub async fn refresh(&self, asset: Asset) -> PriceQuote {
        let Some(slot) = self.slot(asset) else {
            let err = FetchError::UnsupportedAsset(asset.symbol().to_string());
            warn!(asset = %asset, error = %err, "Feed refresh rejected");
            return failure_quote(asset, 0.0);
        };

        let Some(_guard) = InFlightGuard::acquire(&slot.in_flight) else {
            debug!(asset = %asset, "Refresh already in flight");
            return busy_quote(asset, &slot.state.read());
        };

        match self.read_oracle(asset).await {
            Ok(reading) => self.apply(asset, &slot, reading),
            Err(e) => {
                warn!(asset = %asset, kind = e.kind(), error = %e, "Failed to read oracle feed");
                failure_quote(asset, slot.state.read().last_price)
            }
        }
    }

    async fn read_oracle(&self, asset: Asset) -> FetchResult<OracleReading> {
        let calldata = encode_feed_call(asset)?;
        let data = self
            .transport
            .eth_call(self.contract, Bytes::from(calldata))
            .await?;
        decode_feed_return(asset, &data)
    }

    fn apply(&self, asset: Asset, slot: &AssetSlot, reading: OracleReading) -> PriceQuote {
        let price = reading.price();
        let now = now_ms();

        let mut state = slot.state.write();

        let previous = if state.last_price > 0.0 { state.last_price } else { price };
        let change = price - previous;
        let change_percent = if previous > 0.0 { change / previous * 100.0 } else { 0.0 };

        state.last_price = price;
        state.history.push_back(HistoryPoint { timestamp: now, price });
        while state.history.len() > self.history_capacity {
            state.history.pop_front();
        }
        state.last_update_ms = now;

        let quote = PriceQuote::new(asset.symbol(), price, reading.timestamp_ms(), QuoteSource::OnChainOracle)
            .with_change(change, change_percent)
            .with_feed_status(FeedStatus::Healthy)
            .with_raw(reading.exponent, reading.magnitude.to_string());
        state.last_quote = Some(quote.clone());

        info!(
            asset = %asset,
            price,
            raw = %reading.magnitude,
            decimals = reading.exponent,
            oracle_ts = reading.timestamp_secs,
            "Oracle feed updated"
        );

        quote
    }

    /// Snapshot of the rolling history, oldest first
    pub fn history(&self, asset: Asset) -> Vec<HistoryPoint> {
        self.slot(asset)
            .map(|slot| slot.state.read().history.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Millis of the last successful refresh, 0 if none
    pub fn last_update_time(&self, asset: Asset) -> u64 {
        self.slot(asset)
            .map(|slot| slot.state.read().last_update_ms)
            .unwrap_or(0)
    }

    pub fn last_price(&self, asset: Asset) -> f64 {
        self.slot(asset)
            .map(|slot| slot.state.read().last_price)
            .unwrap_or(0.0)
    }

    /// Quote produced by the last successful refresh
    pub fn last_quote(&self, asset: Asset) -> Option<PriceQuote> {
        self.slot(asset).and_then(|slot| slot.state.read().last_quote.clone())
    }
}

fn failure_quote(asset: Asset, last_price: f64) -> PriceQuote {
    PriceQuote::new(asset.symbol(), last_price, now_ms(), QuoteSource::Error)
        .with_change(0.0, 0.0)
        .with_feed_status(FeedStatus::Unavailable)
        .with_raw(FAILED_READ_DECIMALS, "0")
}

fn busy_quote(asset: Asset, state: &ResolverState) -> PriceQuote {
    let timestamp = if state.last_update_ms > 0 { state.last_update_ms } else { now_ms() };
    PriceQuote::new(asset.symbol(), state.last_price, timestamp, QuoteSource::Cached)
        .with_change(0.0, 0.0)
        .with_feed_status(FeedStatus::Latency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::encode_words;
    use crate::testing::{GatedOracle, ScriptedOracle};
    use proptest::prelude::*;

    fn feed(oracle: Arc<ScriptedOracle>) -> OracleFeed {
        OracleFeed::with_transport(oracle, Address::repeat_byte(0xa0), HISTORY_CAPACITY)
    }

    fn ts() -> u64 {
        now_ms() / 1000
    }

    #[tokio::test]
    async fn test_first_refresh_has_zero_change() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_ok(encode_words(6_712_345_000, 5, ts()));
        let feed = feed(oracle);

        let quote = feed.refresh(Asset::Btc).await;

        assert_eq!(quote.source, QuoteSource::OnChainOracle);
        assert_eq!(quote.feed_status, Some(FeedStatus::Healthy));
        assert!((quote.price - 67_123.45).abs() < 1e-6);
        assert_eq!(quote.change_24h, Some(0.0));
        assert_eq!(quote.change_percent_24h, Some(0.0));
        assert_eq!(quote.decimals, Some(5));
        assert_eq!(quote.raw_value.as_deref(), Some("6712345000"));
        assert_eq!(feed.history(Asset::Btc).len(), 1);
        assert!(feed.last_update_time(Asset::Btc) > 0);
        assert_eq!(feed.last_quote(Asset::Btc), Some(quote));
    }

    #[tokio::test]
    async fn test_change_against_previous_price() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle
            .push_ok(encode_words(200_000, 2, ts()))
            .push_ok(encode_words(210_000, 2, ts()));
        let feed = feed(oracle);

        feed.refresh(Asset::Eth).await;
        let quote = feed.refresh(Asset::Eth).await;

        assert!((quote.price - 2_100.0).abs() < 1e-9);
        assert!((quote.change_24h.unwrap() - 100.0).abs() < 1e-9);
        assert!((quote.change_percent_24h.unwrap() - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_refresh_preserves_state() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle
            .push_ok(encode_words(1_850, 5, ts()))
            .push_err(FetchError::Rpc { code: 3, message: "execution reverted".into() });
        let feed = feed(oracle);

        feed.refresh(Asset::Flr).await;
        let before_history = feed.history(Asset::Flr);
        let before_update = feed.last_update_time(Asset::Flr);

        let quote = feed.refresh(Asset::Flr).await;

        assert_eq!(quote.source, QuoteSource::Error);
        assert_eq!(quote.feed_status, Some(FeedStatus::Unavailable));
        assert!((quote.price - 0.0185).abs() < 1e-12);
        assert_eq!(quote.change_24h, Some(0.0));
        assert_eq!(quote.change_percent_24h, Some(0.0));
        assert_eq!(quote.decimals, Some(7));
        assert_eq!(quote.raw_value.as_deref(), Some("0"));
        assert_eq!(feed.history(Asset::Flr), before_history);
        assert_eq!(feed.last_update_time(Asset::Flr), before_update);
        assert!((feed.last_price(Asset::Flr) - 0.0185).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_failure_before_any_success_reports_zero() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_err(FetchError::Timeout(8_000));
        let feed = feed(oracle);

        let quote = feed.refresh(Asset::Btc).await;

        assert_eq!(quote.price, 0.0);
        assert_eq!(quote.feed_status, Some(FeedStatus::Unavailable));
        assert!(feed.history(Asset::Btc).is_empty());
        assert_eq!(feed.last_update_time(Asset::Btc), 0);
        assert!(feed.last_quote(Asset::Btc).is_none());
    }

    #[tokio::test]
    async fn test_malformed_return_is_unavailable() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_ok(vec![0u8; 10]);
        let feed = feed(oracle);

        let quote = feed.refresh(Asset::Eth).await;
        assert_eq!(quote.feed_status, Some(FeedStatus::Unavailable));
        assert!(feed.history(Asset::Eth).is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_asset_never_calls_oracle() {
        let oracle = Arc::new(ScriptedOracle::new());
        let feed = feed(Arc::clone(&oracle));

        let quote = feed.refresh(Asset::Xrp).await;

        assert_eq!(quote.source, QuoteSource::Error);
        assert_eq!(oracle.call_count(), 0);
        assert!(!feed.supports(Asset::Xrp));
        assert_eq!(feed.assets(), vec![Asset::Btc, Asset::Eth, Asset::Flr]);
    }

    #[tokio::test]
    async fn test_history_evicts_oldest_after_cap() {
        let oracle = Arc::new(ScriptedOracle::new());
        for i in 0..=HISTORY_CAPACITY as u128 {
            oracle.push_ok(encode_words(100 + i, 0, ts()));
        }
        let feed = feed(oracle);

        for _ in 0..=HISTORY_CAPACITY {
            feed.refresh(Asset::Btc).await;
        }

        let history = feed.history(Asset::Btc);
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.first().unwrap().price, 101.0);
        assert_eq!(history.last().unwrap().price, 160.0);
        assert!(history.iter().all(|p| p.price != 100.0));
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_history_is_a_snapshot() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_ok(encode_words(5, 0, ts()));
        let feed = feed(oracle);
        feed.refresh(Asset::Eth).await;

        let mut snapshot = feed.history(Asset::Eth);
        snapshot.clear();

        assert_eq!(feed.history(Asset::Eth).len(), 1);
    }

    #[tokio::test]
    async fn test_assets_are_isolated() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_ok(encode_words(5, 0, ts()));
        let feed = feed(oracle);

        feed.refresh(Asset::Eth).await;

        assert!(feed.history(Asset::Btc).is_empty());
        assert_eq!(feed.last_update_time(Asset::Btc), 0);
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_refused() {
        let oracle = Arc::new(GatedOracle::new(encode_words(300, 0, ts())));
        let entered = Arc::clone(&oracle.entered);
        let release = Arc::clone(&oracle.release);
        let feed = Arc::new(OracleFeed::with_transport(oracle, Address::ZERO, HISTORY_CAPACITY));

        let first = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.refresh(Asset::Btc).await })
        };
        entered.notified().await;

        let busy = feed.refresh(Asset::Btc).await;
        assert_eq!(busy.feed_status, Some(FeedStatus::Latency));
        assert_eq!(busy.source, QuoteSource::Cached);

        release.notify_one();
        let done = first.await.unwrap();
        assert_eq!(done.feed_status, Some(FeedStatus::Healthy));
        assert_eq!(feed.history(Asset::Btc).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_history_never_exceeds_capacity(capacity in 1usize..8, refreshes in 0usize..24) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let oracle = Arc::new(ScriptedOracle::new());
            for i in 0..refreshes.max(1) {
                oracle.push_ok(encode_words(1 + i as u128, 0, 1));
            }
            let feed = OracleFeed::with_transport(oracle, Address::ZERO, capacity);

            rt.block_on(async {
                for _ in 0..refreshes {
                    feed.refresh(Asset::Eth).await;
                }
            });

            let history = feed.history(Asset::Eth);
            prop_assert_eq!(history.len(), refreshes.min(capacity));
            if refreshes > 0 {
                prop_assert_eq!(history.last().unwrap().price, refreshes as f64);
            }
        }
    }
}
