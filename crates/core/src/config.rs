//! Configuration types

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ConfigError;
use crate::Asset;

/// Prefix for environment overrides, e.g. `FTSO__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "FTSO";

/// Oracle RPC endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub http_url: String,
    pub contract_address: Address,
    pub timeout_ms: u64,
}

impl RpcConfig {
    /// Flare mainnet FTSO price reader
    pub fn flare_mainnet() -> Self {
        Self {
            http_url: "https://flare-api.flare.network/ext/C/rpc".to_string(),
            contract_address: address!("305154ff8BaAeb3bB58Fac757B0f0a9575416233"),
            timeout_ms: 8_000,
        }
    }

    /// Coston2 testnet FTSO price reader
    pub fn coston2() -> Self {
        Self {
            http_url: "https://coston2-api.flare.network/ext/C/rpc".to_string(),
            contract_address: address!("a0A517b82088a23A099363841A7c79eaAF4Adac8"),
            timeout_ms: 8_000,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Public market data API (REST fallback tier)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub cache_ttl_ms: u64,
    pub timeout_ms: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            cache_ttl_ms: 10_000,
            timeout_ms: 8_000,
        }
    }
}

/// Server-side multi-source resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub oracle: RpcConfig,
    pub market_data: MarketDataConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            oracle: RpcConfig::flare_mainnet(),
            market_data: MarketDataConfig::default(),
        }
    }
}

/// On-chain feed and poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub oracle: RpcConfig,
    pub assets: Vec<Asset>,
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
    pub poller_enabled: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            oracle: RpcConfig::coston2(),
            assets: vec![Asset::Btc, Asset::Eth, Asset::Flr],
            poll_interval_ms: 5_000,
            history_capacity: 60,
            poller_enabled: true,
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub resolver: ResolverConfig,
    pub feed: FeedConfig,
}

impl AppConfig {
    /// Layer defaults, an optional config file and `FTSO__*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let loaded: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("feed.poll_interval_ms must be > 0".into()));
        }
        if self.feed.history_capacity == 0 {
            return Err(ConfigError::Invalid("feed.history_capacity must be > 0".into()));
        }
        for (name, timeout) in [
            ("resolver.oracle.timeout_ms", self.resolver.oracle.timeout_ms),
            ("resolver.market_data.timeout_ms", self.resolver.market_data.timeout_ms),
            ("feed.oracle.timeout_ms", self.feed.oracle.timeout_ms),
        ] {
            if timeout == 0 {
                return Err(ConfigError::Invalid(format!("{} must be > 0", name)));
            }
        }
        Ok(())
    }
}
