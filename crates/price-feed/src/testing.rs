//! In-process fakes for the transport traits

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use ftso_core::{FetchError, FetchResult};

use crate::feeds::{OracleTransport, SpotPriceSource};

/// Replays scripted `eth_call` results; repeats the last one when exhausted
#[derive(Default)]
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<FetchResult<Bytes>>>,
    pub calls: AtomicUsize,
    pub last_call: Mutex<Option<(Address, Bytes)>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, payload: Vec<u8>) -> &Self {
        self.responses.lock().push_back(Ok(Bytes::from(payload)));
        self
    }

    pub fn push_err(&self, err: FetchError) -> &Self {
        self.responses.lock().push_back(Err(err));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn replay(err: &FetchError) -> FetchError {
    match err {
        FetchError::Rpc { code, message } => FetchError::Rpc { code: *code, message: message.clone() },
        FetchError::Timeout(ms) => FetchError::Timeout(*ms),
        FetchError::EmptyResult => FetchError::EmptyResult,
        other => FetchError::Transport(other.to_string()),
    }
}

#[async_trait]
impl OracleTransport for ScriptedOracle {
    async fn eth_call(&self, to: Address, data: Bytes) -> FetchResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_call.lock() = Some((to, data));

        let mut responses = self.responses.lock();
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            None
        };
        match next {
            Some(result) => result,
            None => match responses.front() {
                Some(Ok(bytes)) => Ok(bytes.clone()),
                Some(Err(err)) => Err(replay(err)),
                None => Err(FetchError::Transport("no scripted response".into())),
            },
        }
    }
}

/// Oracle that parks each call until released
pub struct GatedOracle {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    payload: Vec<u8>,
}

impl GatedOracle {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            payload,
        }
    }
}

#[async_trait]
impl OracleTransport for GatedOracle {
    async fn eth_call(&self, _to: Address, _data: Bytes) -> FetchResult<Bytes> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Bytes::from(self.payload.clone()))
    }
}

/// Spot source returning a fixed answer
pub struct FixedSpot {
    answer: Option<f64>,
    pub calls: AtomicUsize,
}

impl FixedSpot {
    pub fn price(price: f64) -> Self {
        Self { answer: Some(price), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { answer: None, calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpotPriceSource for FixedSpot {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn usd_price(&self, coin_id: &str) -> FetchResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .ok_or_else(|| FetchError::HttpStatus(429))
            .map_err(|e| FetchError::Transport(format!("{} for {}", e, coin_id)))
    }
}
