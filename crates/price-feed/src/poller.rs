//! Supervised periodic refresh of the oracle feed

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use ftso_core::{Asset, FeedConfig, FeedStatus, PriceQuote};

use crate::state::OracleFeed;

/// Poller configuration
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub assets: Vec<Asset>,
    pub channel_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            assets: vec![Asset::Btc, Asset::Eth, Asset::Flr],
            channel_capacity: 1_024,
        }
    }
}

impl From<&FeedConfig> for PollerConfig {
    fn from(config: &FeedConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            assets: config.assets.clone(),
            ..Default::default()
        }
    }
}

/// Drives [`OracleFeed::refresh`] on a fixed cadence.
///
/// Assets are refreshed one after another inside a tick, so a slow read
/// delays the round instead of overlapping the next one.
pub struct FeedPoller {
    config: PollerConfig,
    feed: Arc<OracleFeed>,
    update_tx: mpsc::Sender<PriceQuote>,
    update_rx: Option<mpsc::Receiver<PriceQuote>>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    rounds: Arc<AtomicU64>,
}

impl FeedPoller {
    pub fn new(config: PollerConfig, feed: Arc<OracleFeed>) -> Self {
        let (update_tx, update_rx) = mpsc::channel(config.channel_capacity.max(1));

        Self {
            config,
            feed,
            update_tx,
            update_rx: Some(update_rx),
            shutdown: None,
            handle: None,
            running: Arc::new(AtomicBool::new(false)),
            rounds: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get update receiver (can only be taken once)
    pub fn take_update_receiver(&mut self) -> Option<mpsc::Receiver<PriceQuote>> {
        self.update_rx.take()
    }

    /// Spawn the polling task
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.is_running() {
            anyhow::bail!("Feed poller already running");
        }

        let assets: Vec<Asset> = self
            .config
            .assets
            .iter()
            .copied()
            .filter(|asset| {
                let supported = self.feed.supports(*asset);
                if !supported {
                    warn!(asset = %asset, "Asset has no oracle accessor, not polling it");
                }
                supported
            })
            .collect();

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let feed = Arc::clone(&self.feed);
        let tx = self.update_tx.clone();
        let running = Arc::clone(&self.running);
        let rounds = Arc::clone(&self.rounds);
        let period = self.config.interval;

        running.store(true, Ordering::SeqCst);
        info!(interval = ?period, assets = assets.len(), "Starting feed poller");

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        for asset in &assets {
                            let quote = feed.refresh(*asset).await;

                            if quote.feed_status == Some(FeedStatus::Unavailable) {
                                warn!(asset = %asset, price = quote.price, "Feed unavailable");
                            } else {
                                debug!(asset = %asset, price = quote.price, "Feed refreshed");
                            }

                            if let Err(e) = tx.try_send(quote) {
                                debug!(asset = %asset, "Dropping feed update: {}", e);
                            }
                        }
                        rounds.fetch_add(1, Ordering::Relaxed);
                    }
                    _ = &mut shutdown_rx => {
                        info!("Feed poller shutdown requested");
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
        });

        self.shutdown = Some(shutdown_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Signal shutdown and wait for the current round to finish
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Feed poller task failed: {}", e);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Feed poller stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Completed polling rounds
    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }
}
