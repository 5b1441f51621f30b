//! FTSO price resolution
//!
//! Features:
//! - Raw and typed `eth_call` reads of the FTSO price reader
//! - Server-side resolver with market data and constant fallbacks
//! - On-chain feed with per-asset rolling history
//! - Supervised polling with bounded per-call timeouts

pub mod aggregator;
pub mod contracts;
pub mod decode;
pub mod feeds;
pub mod poller;
pub mod state;

#[cfg(test)]
mod testing;

pub use aggregator::{AggregatorStats, PriceAggregator};
pub use decode::OracleReading;
pub use feeds::{CoinGeckoClient, JsonRpcTransport, OracleTransport, SpotPriceSource};
pub use poller::{FeedPoller, PollerConfig};
pub use state::OracleFeed;
