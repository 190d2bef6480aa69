//! Event replay with per-step invariant checking.
//!
//! The harness owns one vault's worth of state (ledger, reward stream,
//! position graph, oracle, clock) and applies events sequentially. A
//! failing event is recorded and skipped; replay continues so one
//! malformed event cannot abort a whole run. After every event the global
//! invariant suite runs, and the final report carries each violation
//! tagged with the event index that triggered it.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::events::{AppliedEffect, Event, StepOutcome, StepResult};
use crate::invariants::{
    assets_explained, health_cost_bounded, position_caps_ok, price_within_tolerance,
    shares_consistent, smoother_conserves, Violation,
};
use crate::ledger::{LedgerConfig, ShareLedger, SyncDelta};
use crate::oracle::FixedPriceOracle;
use crate::positions::{GraphConfig, PositionGraph};
use crate::smoother::RewardSmoother;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub ledger: LedgerConfig,
    pub graph: GraphConfig,
    pub smoothing_period: u64,
    /// Allowed per-event share-price move for non-yield events, bps.
    pub price_tolerance_bps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            graph: GraphConfig::default(),
            smoothing_period: 86_400,
            price_tolerance_bps: 10,
        }
    }
}

/// Serializable state snapshot for replay and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub now: u64,
    pub ledger: ShareLedger,
    pub smoother: RewardSmoother,
    pub positions: PositionGraph,
    pub prices: FixedPriceOracle,
}

/// Primary output artifact: per-event results plus every invariant
/// violation, suitable as a CI gate.
#[derive(Debug, Clone, Serialize)]
pub struct InvariantReport {
    pub steps: Vec<StepResult>,
    pub violations: Vec<Violation>,
    pub snapshot: Snapshot,
}

impl InvariantReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

pub struct InvariantHarness {
    ledger: ShareLedger,
    smoother: RewardSmoother,
    graph: PositionGraph,
    oracle: FixedPriceOracle,
    now: u64,
    /// Deposits − withdrawals + released yield; drift from the ledger's
    /// total is an invariant violation.
    expected_assets: u128,
    price_tolerance_bps: u32,
    last_health_cost: u32,
    violations: Vec<Violation>,
}

impl InvariantHarness {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let ledger = ShareLedger::create(config.ledger)?;
        let graph = PositionGraph::create(config.graph)?;
        let smoother = RewardSmoother::new(config.smoothing_period, 0)?;
        Ok(Self {
            ledger,
            smoother,
            graph,
            oracle: FixedPriceOracle::new(),
            now: 0,
            expected_assets: 0,
            price_tolerance_bps: config.price_tolerance_bps,
            last_health_cost: 0,
            violations: Vec::new(),
        })
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn ledger(&self) -> &ShareLedger {
        &self.ledger
    }

    pub fn smoother(&self) -> &RewardSmoother {
        &self.smoother
    }

    pub fn graph(&self) -> &PositionGraph {
        &self.graph
    }

    pub fn oracle(&self) -> &FixedPriceOracle {
        &self.oracle
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            now: self.now,
            ledger: self.ledger.clone(),
            smoother: self.smoother.clone(),
            positions: self.graph.clone(),
            prices: self.oracle.clone(),
        }
    }

    fn apply(&mut self, event: &Event) -> Result<AppliedEffect, EngineError> {
        match event {
            Event::Deposit { owner, assets } => {
                let shares = self.ledger.deposit(*owner, *assets)?;
                self.expected_assets = self
                    .expected_assets
                    .checked_add(*assets)
                    .ok_or(EngineError::Math(crate::math::MathError::Overflow))?;
                Ok(AppliedEffect::SharesMinted { shares })
            }
            Event::Withdraw { owner, shares } => {
                let assets = self.ledger.withdraw(*owner, *shares)?;
                self.expected_assets = self.expected_assets.saturating_sub(assets);
                Ok(AppliedEffect::AssetsWithdrawn { assets })
            }
            Event::Donate { amount, declared } => {
                if *declared {
                    self.smoother.accrue(*amount, self.now)?;
                    Ok(AppliedEffect::ProfitAccrued { amount: *amount })
                } else {
                    let quarantined = self.ledger.donate(*amount)?;
                    Ok(AppliedEffect::DonationQuarantined { amount: quarantined })
                }
            }
            Event::Sync { observed_assets } => {
                let mut quarantined = 0;
                if let Some(observed) = observed_assets {
                    // The reward stream holds its unreleased profit outside
                    // the ledger's books; only the rest must be explained.
                    let tracked = observed
                        .checked_sub(self.smoother.unreleased())
                        .ok_or(EngineError::InsufficientAssets)?;
                    if let SyncDelta::Quarantined(amount) = self.ledger.sync(tracked)? {
                        quarantined = amount;
                    }
                }
                let released = self.smoother.sync(self.now)?;
                self.ledger.credit_yield(released)?;
                self.expected_assets = self
                    .expected_assets
                    .checked_add(released)
                    .ok_or(EngineError::Math(crate::math::MathError::Overflow))?;
                Ok(AppliedEffect::ProfitReleased {
                    amount: released,
                    quarantined,
                })
            }
            Event::AdvanceTime { by } => {
                self.now = self.now.saturating_add(*by);
                Ok(AppliedEffect::TimeAdvanced { now: self.now })
            }
            Event::OpenPosition { caller, owner, terms } => {
                let position_id = self.graph.open_position(*caller, *owner, *terms)?;
                Ok(AppliedEffect::PositionOpened { position_id })
            }
            Event::ClosePosition { caller, position_id } => {
                let closed = self.graph.close_position(*caller, *position_id)?;
                Ok(AppliedEffect::PositionClosed { position_id: closed.id })
            }
            Event::AuthorizeCreator { owner, creator } => {
                self.graph.authorize_creator(*owner, *creator);
                Ok(AppliedEffect::CreatorAuthorized {
                    owner: *owner,
                    creator: *creator,
                })
            }
            Event::Liquidate { payer, owner, position_id } => {
                let (_, cost) = self.graph.health_factor_metered(*owner, &self.oracle)?;
                self.last_health_cost = cost;
                let outcome = self
                    .graph
                    .liquidate(*payer, *owner, *position_id, &self.oracle)?;
                Ok(AppliedEffect::Liquidated(outcome))
            }
            Event::SetPrice { asset, price } => {
                self.oracle.set_price(*asset, *price);
                Ok(AppliedEffect::PriceSet {
                    asset: *asset,
                    price: *price,
                })
            }
        }
    }

    fn check_invariants(&mut self, index: usize, price_before: u128, yield_release: bool) {
        let mut push = |invariant: &'static str, found: Option<(u128, u128)>| {
            if let Some((observed, expected)) = found {
                self.violations.push(Violation {
                    event_index: index,
                    invariant,
                    observed,
                    expected,
                });
            }
        };
        push("shares-consistent", shares_consistent(&self.ledger));
        push(
            "assets-explained",
            assets_explained(&self.ledger, self.expected_assets),
        );
        if let Ok(price_after) = self.ledger.share_price() {
            push(
                "share-price-no-manipulation",
                price_within_tolerance(
                    price_before,
                    price_after,
                    yield_release,
                    self.price_tolerance_bps,
                ),
            );
        }
        push("smoother-conserves", smoother_conserves(&self.smoother));
        push("position-cap", position_caps_ok(&self.graph));
        push(
            "health-cost-bounded",
            health_cost_bounded(self.last_health_cost, self.graph.config().health_cost_ceiling),
        );
    }

    /// Apply one event; on error the state is untouched and the error is
    /// recorded in the result, not propagated.
    pub fn step(&mut self, index: usize, event: Event) -> StepResult {
        let price_before = self.ledger.share_price().unwrap_or(0);
        let yield_release = matches!(event, Event::Sync { .. });
        let outcome = match self.apply(&event) {
            Ok(effect) => StepOutcome::Applied { effect },
            Err(error) => StepOutcome::Rejected { error },
        };
        self.check_invariants(index, price_before, yield_release);
        StepResult { index, event, outcome }
    }

    /// Replay a whole sequence and produce the report.
    pub fn run(&mut self, events: impl IntoIterator<Item = Event>) -> InvariantReport {
        let steps: Vec<StepResult> = events
            .into_iter()
            .enumerate()
            .map(|(i, event)| self.step(i, event))
            .collect();
        InvariantReport {
            steps,
            violations: self.violations.clone(),
            snapshot: self.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetId, OwnerId};

    const ALICE: OwnerId = OwnerId(1);
    const BOB: OwnerId = OwnerId(2);

    fn harness() -> InvariantHarness {
        InvariantHarness::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_deposit_then_withdraw_reports_clean() {
        let mut h = harness();
        let report = h.run(vec![
            Event::Deposit { owner: ALICE, assets: 1_000_000 },
            Event::Withdraw { owner: ALICE, shares: 500_000 },
        ]);
        assert!(report.passed(), "violations: {:?}", report.violations);
        assert!(report.steps.iter().all(StepResult::is_applied));
    }

    #[test]
    fn test_failed_event_does_not_abort_replay() {
        let mut h = harness();
        let report = h.run(vec![
            Event::Withdraw { owner: BOB, shares: 10 }, // nothing deposited
            Event::Deposit { owner: ALICE, assets: 1_000 },
        ]);
        assert_eq!(report.steps[0].error(), Some(EngineError::InsufficientShares));
        assert!(report.steps[1].is_applied());
        assert!(report.passed());
    }

    #[test]
    fn test_declared_yield_flows_through_smoother() {
        let mut h = harness();
        let period = EngineConfig::default().smoothing_period;
        let report = h.run(vec![
            Event::Deposit { owner: ALICE, assets: 1_000_000 },
            Event::Donate { amount: 300_000, declared: true },
            Event::AdvanceTime { by: period },
            Event::Sync { observed_assets: None },
        ]);
        assert!(report.passed(), "violations: {:?}", report.violations);
        // One full period: half the profit released into the ledger.
        assert_eq!(h.ledger().total_assets(), 1_000_000 + 150_000);
        assert_eq!(h.smoother().unreleased(), 150_000);
    }

    #[test]
    fn test_untracked_donation_is_quarantined_not_priced() {
        let mut h = harness();
        let price_after = |h: &InvariantHarness| h.ledger().share_price().unwrap();
        h.step(0, Event::Deposit { owner: ALICE, assets: 1_000_000 });
        let before = price_after(&h);
        let result = h.step(1, Event::Donate { amount: 5_000_000, declared: false });
        assert!(result.is_applied());
        assert_eq!(price_after(&h), before);
        assert_eq!(h.ledger().quarantined_assets(), 5_000_000);
    }

    #[test]
    fn test_sync_reconciles_observed_balance() {
        let mut h = harness();
        h.step(0, Event::Deposit { owner: ALICE, assets: 1_000 });
        // External observation shows 250 units nobody declared.
        let result = h.step(1, Event::Sync { observed_assets: Some(1_250) });
        match result.outcome {
            StepOutcome::Applied {
                effect: AppliedEffect::ProfitReleased { quarantined, .. },
            } => assert_eq!(quarantined, 250),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(h.ledger().quarantined_assets(), 250);
    }

    #[test]
    fn test_time_only_moves_via_advance_time() {
        let mut h = harness();
        h.step(0, Event::Deposit { owner: ALICE, assets: 1_000 });
        assert_eq!(h.now(), 0);
        h.step(1, Event::AdvanceTime { by: 42 });
        assert_eq!(h.now(), 42);
    }

    #[test]
    fn test_liquidation_pipeline_through_events() {
        let mut h = harness();
        let collateral = h.graph().config().collateral_asset;
        let debt = h.graph().config().debt_asset;
        let report = h.run(vec![
            Event::SetPrice { asset: collateral, price: 2_000_000 },
            Event::SetPrice { asset: debt, price: 1_000_000 },
            Event::OpenPosition {
                caller: ALICE,
                owner: ALICE,
                terms: crate::positions::PositionTerms {
                    kind: crate::positions::PositionKind::Simple,
                    collateral_amount: 1_000,
                    debt_amount: 900,
                    price_range_low: 0,
                    price_range_high: 0,
                },
            },
            // Healthy: rejected.
            Event::Liquidate { payer: BOB, owner: ALICE, position_id: crate::types::PositionId(0) },
            // Collateral crashes.
            Event::SetPrice { asset: collateral, price: 800_000 },
            Event::Liquidate { payer: BOB, owner: ALICE, position_id: crate::types::PositionId(0) },
        ]);
        assert_eq!(
            report.steps[3].error(),
            Some(EngineError::HealthFactorAboveThreshold)
        );
        assert!(report.steps[5].is_applied());
        assert!(report.passed(), "violations: {:?}", report.violations);
        assert_eq!(h.graph().position_count(ALICE), 0);
    }

    #[test]
    fn test_snapshot_serializes_with_prices() {
        let mut h = harness();
        h.step(0, Event::SetPrice { asset: AssetId(2), price: 123 });
        let snap = h.snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("123"));
    }
}
