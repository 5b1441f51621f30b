//! Error types

use thiserror::Error;

/// Failure of a single price source attempt
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Empty result from oracle")]
    EmptyResult,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Price {0} outside accepted range")]
    PriceOutOfRange(f64),

    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),
}

impl FetchError {
    /// Coarse category used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) | FetchError::HttpStatus(_) | FetchError::Timeout(_) => {
                "transport"
            }
            FetchError::Rpc { .. } => "protocol",
            FetchError::EmptyResult | FetchError::Decode(_) | FetchError::MissingField(_) => {
                "decode"
            }
            FetchError::PriceOutOfRange(_) | FetchError::UnsupportedAsset(_) => "rejected",
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(FetchError::Timeout(5000).kind(), "transport");
        assert_eq!(
            FetchError::Rpc { code: 3, message: "execution reverted".into() }.kind(),
            "protocol"
        );
        assert_eq!(FetchError::EmptyResult.kind(), "decode");
        assert_eq!(FetchError::PriceOutOfRange(0.0).kind(), "rejected");
    }
}
