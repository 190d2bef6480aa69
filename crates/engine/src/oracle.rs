//! Injected price capability.
//!
//! Prices are synchronous pure lookups supplied by the caller for a given
//! simulation step. A missing or non-positive price is a hard error; the
//! engine never defaults a price.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::AssetId;

/// Price source consumed by health and liquidation math. 1e6 scale.
pub trait PriceOracle {
    fn price(&self, asset: AssetId) -> Option<u128>;
}

/// Fetch a price, mapping absence or zero to `OracleUnavailable`.
pub fn checked_price(oracle: &dyn PriceOracle, asset: AssetId) -> Result<u128, EngineError> {
    match oracle.price(asset) {
        Some(p) if p > 0 => Ok(p),
        _ => Err(EngineError::OracleUnavailable),
    }
}

/// Deterministic oracle backed by a plain map; scenarios mutate it with
/// `SetPrice` events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPriceOracle {
    prices: BTreeMap<AssetId, u128>,
}

impl FixedPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&mut self, asset: AssetId, price: u128) {
        self.prices.insert(asset, price);
    }
}

impl PriceOracle for FixedPriceOracle {
    fn price(&self, asset: AssetId) -> Option<u128> {
        self.prices.get(&asset).copied()
    }
}
