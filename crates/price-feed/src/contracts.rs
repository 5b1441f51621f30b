//! FTSO price reader contract bindings

use alloy_primitives::{fixed_bytes, FixedBytes};
use alloy_sol_types::{sol, SolCall};

use ftso_core::{Asset, FetchError, FetchResult};

use crate::decode::OracleReading;

sol! {
    /// Price reader deployed next to the dashboard, one accessor per feed
    interface IFtsoPriceReader {
        function getBtcUsd() external view returns (uint256, int8, uint64);
        function getEthUsd() external view returns (uint256, int8, uint64);
        function getFlrUsd() external view returns (uint256, int8, uint64);
    }
}

/// Raw selectors of the mainnet reader (`getXxxUsdPrice()`), no arguments
pub fn price_selector(asset: Asset) -> Option<FixedBytes<4>> {
    match asset {
        Asset::Btc => Some(fixed_bytes!("2b3297f9")),
        Asset::Eth => Some(fixed_bytes!("56cf56e5")),
        Asset::Xrp => Some(fixed_bytes!("0a8d2be3")),
        Asset::Flr => None,
    }
}

/// Whether the typed reader exposes an accessor for the asset
pub fn has_feed_accessor(asset: Asset) -> bool {
    matches!(asset, Asset::Btc | Asset::Eth | Asset::Flr)
}

/// Calldata for the typed accessor of an asset
pub fn encode_feed_call(asset: Asset) -> FetchResult<Vec<u8>> {
    match asset {
        Asset::Btc => Ok(IFtsoPriceReader::getBtcUsdCall {}.abi_encode()),
        Asset::Eth => Ok(IFtsoPriceReader::getEthUsdCall {}.abi_encode()),
        Asset::Flr => Ok(IFtsoPriceReader::getFlrUsdCall {}.abi_encode()),
        Asset::Xrp => Err(FetchError::UnsupportedAsset(asset.symbol().to_string())),
    }
}

/// Decode the `(uint256, int8, uint64)` return tuple of a typed accessor
pub fn decode_feed_return(asset: Asset, data: &[u8]) -> FetchResult<OracleReading> {
    if data.is_empty() {
        return Err(FetchError::EmptyResult);
    }

    let (magnitude, exponent, timestamp_secs) = match asset {
        Asset::Btc => {
            let ret = IFtsoPriceReader::getBtcUsdCall::abi_decode_returns(data, true)
                .map_err(abi_error)?;
            (ret._0, ret._1, ret._2)
        }
        Asset::Eth => {
            let ret = IFtsoPriceReader::getEthUsdCall::abi_decode_returns(data, true)
                .map_err(abi_error)?;
            (ret._0, ret._1, ret._2)
        }
        Asset::Flr => {
            let ret = IFtsoPriceReader::getFlrUsdCall::abi_decode_returns(data, true)
                .map_err(abi_error)?;
            (ret._0, ret._1, ret._2)
        }
        Asset::Xrp => return Err(FetchError::UnsupportedAsset(asset.symbol().to_string())),
    };

    Ok(OracleReading {
        magnitude,
        exponent,
        timestamp_secs,
    })
}

fn abi_error(err: alloy_sol_types::Error) -> FetchError {
    FetchError::Decode(err.to_string())
}
