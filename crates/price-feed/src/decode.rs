//! Fixed-point oracle reading decoding
//!
//! The FTSO reader returns `(uint256 value, int8 decimals, uint64 timestamp)`,
//! each ABI-encoded in its own 32-byte word.

use alloy_primitives::U256;

use ftso_core::{FetchError, FetchResult};

/// Three ABI words: magnitude, exponent, timestamp
pub const MIN_PAYLOAD_LEN: usize = 96;

/// Upper sanity bound for a decoded USD price
pub const MAX_SANE_PRICE: f64 = 1_000_000.0;

const WORD: usize = 32;

/// Raw reading as reported by the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleReading {
    pub magnitude: U256,
    pub exponent: i8,
    pub timestamp_secs: u64,
}

impl OracleReading {
    /// `magnitude / 10^exponent`, a negative exponent scales up
    pub fn price(&self) -> f64 {
        f64::from(self.magnitude) / 10f64.powi(self.exponent as i32)
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_secs.saturating_mul(1000)
    }

    /// Price, rejected unless strictly between 0 and [`MAX_SANE_PRICE`]
    pub fn checked_price(&self) -> FetchResult<f64> {
        let price = self.price();
        if price.is_finite() && price > 0.0 && price < MAX_SANE_PRICE {
            Ok(price)
        } else {
            Err(FetchError::PriceOutOfRange(price))
        }
    }
}

/// Decode a raw `eth_call` payload word by word.
///
/// Only the low byte of the exponent word is read and interpreted as
/// two's complement, so `0xfe` is `-2` whether or not the word is
/// sign-extended.
pub fn decode_packed_reading(data: &[u8]) -> FetchResult<OracleReading> {
    if data.is_empty() {
        return Err(FetchError::EmptyResult);
    }
    if data.len() < MIN_PAYLOAD_LEN {
        return Err(FetchError::Decode(format!(
            "payload too short: {} bytes, need {}",
            data.len(),
            MIN_PAYLOAD_LEN
        )));
    }

    let magnitude = U256::from_be_slice(&data[..WORD]);
    let exponent = data[2 * WORD - 1] as i8;

    let timestamp_word = &data[2 * WORD..3 * WORD];
    if timestamp_word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(FetchError::Decode("timestamp exceeds u64".into()));
    }
    let timestamp_bytes = <[u8; 8]>::try_from(&timestamp_word[WORD - 8..])
        .map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(OracleReading {
        magnitude,
        exponent,
        timestamp_secs: u64::from_be_bytes(timestamp_bytes),
    })
}

#[cfg(test)]
pub(crate) fn encode_words(magnitude: u128, exponent: i8, timestamp_secs: u64) -> Vec<u8> {
    let mut data = vec![0u8; MIN_PAYLOAD_LEN];
    data[16..32].copy_from_slice(&magnitude.to_be_bytes());
    // sign-extend like a real ABI encoder
    if exponent < 0 {
        data[32..64].fill(0xff);
    }
    data[63] = exponent as u8;
    data[88..96].copy_from_slice(&timestamp_secs.to_be_bytes());
    data
}
