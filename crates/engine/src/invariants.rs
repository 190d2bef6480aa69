//! Global invariant predicates checked after every replayed event.
//!
//! Each check returns `None` when the invariant holds, or the observed and
//! expected values when it does not. The harness tags the failure with the
//! event index that triggered it.

use serde::Serialize;

use crate::ledger::ShareLedger;
use crate::positions::PositionGraph;
use crate::smoother::RewardSmoother;
use crate::types::BPS_SCALE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub event_index: usize,
    pub invariant: &'static str,
    pub observed: u128,
    pub expected: u128,
}

/// Sum of per-holder balances equals total minted shares.
pub fn shares_consistent(ledger: &ShareLedger) -> Option<(u128, u128)> {
    let sum: u128 = ledger.holders().map(|(_, v)| v).sum();
    if sum == ledger.total_shares() {
        None
    } else {
        Some((sum, ledger.total_shares()))
    }
}

/// `total_assets` equals deposits minus withdrawals plus released yield,
/// as tracked by the harness. Quarantined donations stay outside.
pub fn assets_explained(ledger: &ShareLedger, expected_assets: u128) -> Option<(u128, u128)> {
    if ledger.total_assets() == expected_assets {
        None
    } else {
        Some((ledger.total_assets(), expected_assets))
    }
}

/// The share price may not move more than `tolerance_bps` on a single
/// event, except for declared-yield release, and may never decrease by
/// more than one price unit (rounding).
pub fn price_within_tolerance(
    price_before: u128,
    price_after: u128,
    yield_release: bool,
    tolerance_bps: u32,
) -> Option<(u128, u128)> {
    if price_before == 0 {
        return None;
    }
    if price_after + 1 < price_before {
        return Some((price_after, price_before));
    }
    if yield_release {
        return None;
    }
    let moved = price_after.abs_diff(price_before);
    // moved/before <= tolerance_bps/1e4, cross-multiplied to avoid division
    match moved.checked_mul(BPS_SCALE) {
        None => Some((price_after, price_before)),
        Some(lhs) if lhs > price_before.saturating_mul(tolerance_bps as u128) => {
            Some((price_after, price_before))
        }
        Some(_) => None,
    }
}

/// A stream can never have paid out more than it accrued.
pub fn smoother_conserves(smoother: &RewardSmoother) -> Option<(u128, u128)> {
    let released = smoother.released_so_far();
    let accrued = smoother.window_profit();
    if released <= accrued {
        None
    } else {
        Some((released, accrued))
    }
}

/// Every owner's book is at or under the configured cap.
pub fn position_caps_ok(graph: &PositionGraph) -> Option<(u128, u128)> {
    let cap = graph.config().max_positions_per_owner;
    for owner in graph.owners() {
        let len = graph.position_count(owner);
        if len > cap {
            return Some((len as u128, cap as u128));
        }
    }
    None
}

/// The last health evaluation stayed under the declared cost ceiling.
pub fn health_cost_bounded(last_cost: u32, ceiling: u32) -> Option<(u128, u128)> {
    if last_cost > ceiling {
        Some((last_cost as u128, ceiling as u128))
    } else {
        None
    }
}
