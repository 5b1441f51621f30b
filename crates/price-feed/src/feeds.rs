//! Remote price sources: oracle JSON-RPC and public market data REST

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use ftso_core::{FetchError, FetchResult, MarketDataConfig, RpcConfig};

/// Read-only contract call transport
#[async_trait]
pub trait OracleTransport: Send + Sync {
    /// `eth_call` against the latest block, returning the raw result bytes
    async fn eth_call(&self, to: Address, data: Bytes) -> FetchResult<Bytes>;
}

/// Spot USD quotes keyed by provider-specific coin id
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn usd_price(&self, coin_id: &str) -> FetchResult<f64>;
}

#[derive(Debug, Serialize)]
struct CallRequest {
    to: Address,
    data: Bytes,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: (CallRequest, &'a str),
    id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Turn a JSON-RPC envelope into call bytes
pub(crate) fn parse_call_result(response: JsonRpcResponse) -> FetchResult<Bytes> {
    if let Some(error) = response.error {
        return Err(FetchError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    let result = response.result.ok_or(FetchError::EmptyResult)?;
    if result.is_empty() || result == "0x" {
        return Err(FetchError::EmptyResult);
    }

    result
        .parse::<Bytes>()
        .map_err(|e| FetchError::Decode(format!("invalid hex result: {}", e)))
}

/// Client-side timeouts surface as [`FetchError::Timeout`] like the outer deadline
fn request_error(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout.as_millis() as u64)
    } else {
        FetchError::Transport(error.to_string())
    }
}

/// JSON-RPC 2.0 transport over HTTP
#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    client: Client,
    url: String,
    timeout: Duration,
}

impl JsonRpcTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &RpcConfig) -> anyhow::Result<Self> {
        Self::new(config.http_url.clone(), config.timeout())
    }

    async fn send(&self, request: &JsonRpcRequest<'_>) -> FetchResult<Bytes> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        parse_call_result(body)
    }
}

#[async_trait]
impl OracleTransport for JsonRpcTransport {
    async fn eth_call(&self, to: Address, data: Bytes) -> FetchResult<Bytes> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "eth_call",
            params: (CallRequest { to, data }, "latest"),
            id: 1,
        };

        debug!(url = %self.url, to = %to, "eth_call");

        tokio::time::timeout(self.timeout, self.send(&request))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout.as_millis() as u64))?
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SimplePrice {
    usd: Option<f64>,
}

/// Pull the positive USD price for `coin_id` out of a simple-price body
pub(crate) fn extract_usd_price(body: &HashMap<String, SimplePrice>, coin_id: &str) -> FetchResult<f64> {
    let price = body
        .get(coin_id)
        .and_then(|entry| entry.usd)
        .ok_or_else(|| FetchError::MissingField(format!("{}.usd", coin_id)))?;

    if price > 0.0 {
        Ok(price)
    } else {
        Err(FetchError::PriceOutOfRange(price))
    }
}

/// CoinGecko `simple/price` client
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl CoinGeckoClient {
    pub fn new(config: &MarketDataConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn fetch(&self, coin_id: &str) -> FetchResult<f64> {
        let response = self
            .client
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", coin_id), ("vs_currencies", "usd")])
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body: HashMap<String, SimplePrice> = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        extract_usd_price(&body, coin_id)
    }
}

#[async_trait]
impl SpotPriceSource for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn usd_price(&self, coin_id: &str) -> FetchResult<f64> {
        tokio::time::timeout(self.timeout, self.fetch(coin_id))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout.as_millis() as u64))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(json: &str) -> JsonRpcResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_call_result_ok() {
        let bytes = parse_call_result(rpc(r#"{"jsonrpc":"2.0","id":1,"result":"0x0102ff"}"#)).unwrap();
        assert_eq!(bytes.to_vec(), vec![0x01, 0x02, 0xff]);
    }

    #[test]
    fn test_parse_call_result_error_field() {
        let err = parse_call_result(rpc(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, FetchError::Rpc { code: -32000, .. }));
    }

    #[test]
    fn test_parse_call_result_empty() {
        assert!(matches!(
            parse_call_result(rpc(r#"{"jsonrpc":"2.0","id":1,"result":"0x"}"#)),
            Err(FetchError::EmptyResult)
        ));
        assert!(matches!(
            parse_call_result(rpc(r#"{"jsonrpc":"2.0","id":1}"#)),
            Err(FetchError::EmptyResult)
        ));
        assert!(matches!(
            parse_call_result(rpc(r#"{"jsonrpc":"2.0","id":1,"result":"0xzz"}"#)),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "eth_call",
            params: (
                CallRequest {
                    to: Address::repeat_byte(0x11),
                    data: Bytes::from_static(&[0x2b, 0x32, 0x97, 0xf9]),
                },
                "latest",
            ),
            id: 1,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["method"], "eth_call");
        assert_eq!(json["params"][0]["data"], "0x2b3297f9");
        assert_eq!(json["params"][1], "latest");
    }

    /// Accepts one connection and holds it open without answering
    async fn silent_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_eth_call_times_out() {
        let url = silent_server().await;
        let transport = JsonRpcTransport::new(url, Duration::from_millis(50)).unwrap();

        let result = transport
            .eth_call(Address::ZERO, Bytes::from_static(&[0x2b, 0x32, 0x97, 0xf9]))
            .await;

        assert!(matches!(result, Err(FetchError::Timeout(50))));
    }

    #[tokio::test]
    async fn test_market_price_times_out() {
        let url = silent_server().await;
        let client = CoinGeckoClient::new(&MarketDataConfig {
            base_url: url,
            cache_ttl_ms: 10_000,
            timeout_ms: 50,
        })
        .unwrap();

        let result = client.usd_price("bitcoin").await;

        assert!(matches!(result, Err(FetchError::Timeout(50))));
    }

    #[test]
    fn test_extract_usd_price() {
        let body: HashMap<String, SimplePrice> =
            serde_json::from_str(r#"{"bitcoin":{"usd":67000}}"#).unwrap();
        assert_eq!(extract_usd_price(&body, "bitcoin").unwrap(), 67000.0);
        assert!(matches!(
            extract_usd_price(&body, "ethereum"),
            Err(FetchError::MissingField(_))
        ));

        let zero: HashMap<String, SimplePrice> =
            serde_json::from_str(r#"{"ripple":{"usd":0}}"#).unwrap();
        assert!(extract_usd_price(&zero, "ripple").is_err());
    }
}
