//! Shared builders for end-to-end harness tests.

use sim_engine::{
    AssetId, EngineConfig, Event, InvariantHarness, OwnerId, PositionKind, PositionTerms,
};

pub const ALICE: OwnerId = OwnerId(1);
pub const BOB: OwnerId = OwnerId(2);
pub const CAROL: OwnerId = OwnerId(3);

/// Harness with default markets and the given smoothing period.
pub fn harness_with_period(smoothing_period: u64) -> InvariantHarness {
    let config = EngineConfig {
        smoothing_period,
        ..EngineConfig::default()
    };
    match InvariantHarness::new(config) {
        Ok(h) => h,
        Err(e) => panic!("default engine config rejected: {e}"),
    }
}

/// Price both position-market assets so health is computable.
pub fn price_events(collateral_price: u64, debt_price: u64) -> Vec<Event> {
    let config = EngineConfig::default();
    vec![
        Event::SetPrice {
            asset: config.graph.collateral_asset,
            price: collateral_price.into(),
        },
        Event::SetPrice {
            asset: config.graph.debt_asset,
            price: debt_price.into(),
        },
    ]
}

pub fn collateral_asset() -> AssetId {
    EngineConfig::default().graph.collateral_asset
}

pub fn simple_position(collateral: u64, debt: u64) -> PositionTerms {
    PositionTerms {
        kind: PositionKind::Simple,
        collateral_amount: collateral.into(),
        debt_amount: debt.into(),
        price_range_low: 0,
        price_range_high: 0,
    }
}

/// Open a self-owned position.
pub fn open(owner: OwnerId, terms: PositionTerms) -> Event {
    Event::OpenPosition {
        caller: owner,
        owner,
        terms,
    }
}
