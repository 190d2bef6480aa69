//! Per-owner leveraged position books with bounded-cost health.
//!
//! The book is a hard-capped array per owner and the health factor reads
//! incrementally maintained aggregates, so evaluating an owner's health
//! costs the same no matter how many positions they (or an attacker
//! gifting positions at them) hold. Third-party creation requires an
//! explicit consent entry and is checked before capacity, so a stranger
//! can neither fill a victim's slots nor probe how many are left.

use std::collections::{BTreeMap, BTreeSet};

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::math::{mul_div, MathError, Rounding};
use crate::oracle::{checked_price, PriceOracle};
use crate::types::{AssetId, OwnerId, PositionId, BPS_SCALE, PRICE_SCALE};

/// Compile-time bound on positions per owner; the configured cap may be
/// lower but never higher.
pub const MAX_POSITIONS_PER_OWNER: usize = 16;

/// Cost units a single health evaluation consumes: two oracle reads and
/// three fixed-point divisions, independent of position count.
pub const HEALTH_EVAL_COST: u32 = 5;

/// Valuation strategy for a position's collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionKind {
    Simple,
    /// Collateral grows with accrual events.
    Compounding,
    /// Range-bound, cubic payoff approximation: 3% valuation haircut.
    RangeD3,
    /// Range-bound, quartic payoff approximation: 4% valuation haircut.
    RangeD4,
}

impl PositionKind {
    fn is_ranged(self) -> bool {
        matches!(self, PositionKind::RangeD3 | PositionKind::RangeD4)
    }

    /// Basis points of collateral counted toward health.
    fn collateral_weight_bps(self) -> u128 {
        match self {
            PositionKind::Simple | PositionKind::Compounding => 10_000,
            PositionKind::RangeD3 => 9_700,
            PositionKind::RangeD4 => 9_600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub owner: OwnerId,
    pub kind: PositionKind,
    pub collateral_amount: u128,
    pub debt_amount: u128,
    /// Meaningful for the range kinds only; zero otherwise.
    pub price_range_low: u128,
    pub price_range_high: u128,
    /// Haircut collateral counted in the owner's aggregate.
    pub effective_collateral: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub collateral_asset: AssetId,
    pub debt_asset: AssetId,
    pub max_positions_per_owner: usize,
    /// Health factor below this is liquidatable. 1e6 scale.
    pub liquidation_threshold: u128,
    /// Liquidator bonus in basis points of repaid debt value.
    pub liquidation_bonus_bps: u32,
    /// Invariant ceiling on health evaluation cost units.
    pub health_cost_ceiling: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            collateral_asset: AssetId(2),
            debt_asset: AssetId(3),
            max_positions_per_owner: MAX_POSITIONS_PER_OWNER,
            liquidation_threshold: PRICE_SCALE, // 1.0
            liquidation_bonus_bps: 500,
            health_cost_ceiling: HEALTH_EVAL_COST,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.collateral_asset == self.debt_asset {
            return Err(EngineError::DegenerateMarketConfig);
        }
        if self.max_positions_per_owner == 0
            || self.max_positions_per_owner > MAX_POSITIONS_PER_OWNER
        {
            return Err(EngineError::DegenerateMarketConfig);
        }
        if self.liquidation_threshold == 0 {
            return Err(EngineError::DegenerateMarketConfig);
        }
        Ok(())
    }
}

/// Parameters for opening a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionTerms {
    pub kind: PositionKind,
    pub collateral_amount: u128,
    pub debt_amount: u128,
    #[serde(default)]
    pub price_range_low: u128,
    #[serde(default)]
    pub price_range_high: u128,
}

/// What a successful liquidation moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiquidationOutcome {
    pub position_id: PositionId,
    pub owner: OwnerId,
    pub payer: OwnerId,
    pub debt_repaid: u128,
    pub collateral_seized: u128,
    /// Collateral left over after the seizure, returned to the owner.
    pub collateral_returned: u128,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OwnerBook {
    positions: ArrayVec<Position, MAX_POSITIONS_PER_OWNER>,
    /// Running sums so health never scans the position list.
    agg_effective_collateral: u128,
    agg_debt: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionGraph {
    config: GraphConfig,
    books: BTreeMap<OwnerId, OwnerBook>,
    authorized_creators: BTreeMap<OwnerId, BTreeSet<OwnerId>>,
    next_position_id: u64,
}

impl PositionGraph {
    pub fn create(config: GraphConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            books: BTreeMap::new(),
            authorized_creators: BTreeMap::new(),
            next_position_id: 0,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn position_count(&self, owner: OwnerId) -> usize {
        self.books.get(&owner).map_or(0, |b| b.positions.len())
    }

    pub fn owners(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.books.keys().copied()
    }

    pub fn positions(&self, owner: OwnerId) -> &[Position] {
        self.books.get(&owner).map_or(&[], |b| b.positions.as_slice())
    }

    /// Pre-authorize `creator` to open positions for `owner`.
    pub fn authorize_creator(&mut self, owner: OwnerId, creator: OwnerId) {
        self.authorized_creators
            .entry(owner)
            .or_default()
            .insert(creator);
    }

    pub fn revoke_creator(&mut self, owner: OwnerId, creator: OwnerId) {
        if let Some(set) = self.authorized_creators.get_mut(&owner) {
            set.remove(&creator);
        }
    }

    fn consent_ok(&self, caller: OwnerId, owner: OwnerId) -> bool {
        caller == owner
            || self
                .authorized_creators
                .get(&owner)
                .is_some_and(|set| set.contains(&caller))
    }

    /// Open a position for `owner`. Consent is checked before capacity so
    /// an unconsented caller learns nothing about remaining slots.
    pub fn open_position(
        &mut self,
        caller: OwnerId,
        owner: OwnerId,
        terms: PositionTerms,
    ) -> Result<PositionId, EngineError> {
        if !self.consent_ok(caller, owner) {
            return Err(EngineError::ConsentRequired);
        }
        if terms.kind.is_ranged() && terms.price_range_low >= terms.price_range_high {
            return Err(EngineError::DegenerateMarketConfig);
        }
        if self.position_count(owner) >= self.config.max_positions_per_owner {
            return Err(EngineError::CapacityExceeded);
        }

        let effective = mul_div(
            terms.collateral_amount,
            terms.kind.collateral_weight_bps(),
            BPS_SCALE,
            Rounding::Down,
        )?;

        let book = self.books.entry(owner).or_default();
        let new_collateral = book
            .agg_effective_collateral
            .checked_add(effective)
            .ok_or(EngineError::Math(MathError::Overflow))?;
        let new_debt = book
            .agg_debt
            .checked_add(terms.debt_amount)
            .ok_or(EngineError::Math(MathError::Overflow))?;

        let id = PositionId(self.next_position_id);
        book.positions
            .try_push(Position {
                id,
                owner,
                kind: terms.kind,
                collateral_amount: terms.collateral_amount,
                debt_amount: terms.debt_amount,
                price_range_low: if terms.kind.is_ranged() { terms.price_range_low } else { 0 },
                price_range_high: if terms.kind.is_ranged() { terms.price_range_high } else { 0 },
                effective_collateral: effective,
            })
            .map_err(|_| EngineError::CapacityExceeded)?;
        book.agg_effective_collateral = new_collateral;
        book.agg_debt = new_debt;
        self.next_position_id += 1;
        Ok(id)
    }

    fn locate(&self, position_id: PositionId) -> Option<(OwnerId, usize)> {
        for (owner, book) in &self.books {
            if let Some(idx) = book.positions.iter().position(|p| p.id == position_id) {
                return Some((*owner, idx));
            }
        }
        None
    }

    fn remove_at(&mut self, owner: OwnerId, idx: usize) -> Result<Position, EngineError> {
        let book = self.books.get_mut(&owner).ok_or(EngineError::NotFound)?;
        if idx >= book.positions.len() {
            return Err(EngineError::NotFound);
        }
        let position = book.positions.remove(idx);
        book.agg_effective_collateral = book
            .agg_effective_collateral
            .saturating_sub(position.effective_collateral);
        book.agg_debt = book.agg_debt.saturating_sub(position.debt_amount);
        Ok(position)
    }

    /// Close an owned position and return it.
    pub fn close_position(
        &mut self,
        caller: OwnerId,
        position_id: PositionId,
    ) -> Result<Position, EngineError> {
        let (owner, idx) = self.locate(position_id).ok_or(EngineError::NotFound)?;
        if owner != caller {
            return Err(EngineError::NotOwner);
        }
        self.remove_at(owner, idx)
    }

    /// Grow the effective collateral of an owner's compounding positions
    /// by `rate_bps`, updating the running aggregate alongside.
    pub fn accrue_compounding(&mut self, owner: OwnerId, rate_bps: u32) -> Result<(), EngineError> {
        let Some(book) = self.books.get_mut(&owner) else {
            return Ok(());
        };
        for position in book.positions.iter_mut() {
            if position.kind != PositionKind::Compounding {
                continue;
            }
            let growth = mul_div(
                position.effective_collateral,
                rate_bps as u128,
                BPS_SCALE,
                Rounding::Down,
            )?;
            position.effective_collateral = position
                .effective_collateral
                .checked_add(growth)
                .ok_or(EngineError::Math(MathError::Overflow))?;
            book.agg_effective_collateral = book
                .agg_effective_collateral
                .checked_add(growth)
                .ok_or(EngineError::Math(MathError::Overflow))?;
        }
        Ok(())
    }

    /// Aggregate health factor plus the cost units the evaluation spent.
    /// Reads the running aggregates only: O(1) in position count.
    pub fn health_factor_metered(
        &self,
        owner: OwnerId,
        oracle: &dyn PriceOracle,
    ) -> Result<(u128, u32), EngineError> {
        let mut cost = 0u32;
        let Some(book) = self.books.get(&owner) else {
            return Ok((u128::MAX, cost));
        };
        if book.agg_debt == 0 {
            return Ok((u128::MAX, cost));
        }
        let collateral_price = checked_price(oracle, self.config.collateral_asset)?;
        cost += 1;
        let debt_price = checked_price(oracle, self.config.debt_asset)?;
        cost += 1;
        let collateral_value = mul_div(
            book.agg_effective_collateral,
            collateral_price,
            PRICE_SCALE,
            Rounding::Down,
        )?;
        cost += 1;
        let debt_value = mul_div(book.agg_debt, debt_price, PRICE_SCALE, Rounding::Up)?;
        cost += 1;
        if debt_value == 0 {
            return Ok((u128::MAX, cost));
        }
        let ratio = mul_div(collateral_value, PRICE_SCALE, debt_value, Rounding::Down)?;
        cost += 1;
        Ok((ratio, cost))
    }

    /// 1e6-scaled collateral-value / debt-value ratio; `u128::MAX` when
    /// the owner has no debt.
    pub fn health_factor(
        &self,
        owner: OwnerId,
        oracle: &dyn PriceOracle,
    ) -> Result<u128, EngineError> {
        self.health_factor_metered(owner, oracle).map(|(hf, _)| hf)
    }

    /// Liquidate one position of an unhealthy owner. The payer assumes the
    /// position's debt and seizes collateral worth the repaid debt plus
    /// the configured bonus, capped at the position's collateral. All
    /// prices are fetched before any state changes.
    pub fn liquidate(
        &mut self,
        payer: OwnerId,
        owner: OwnerId,
        position_id: PositionId,
        oracle: &dyn PriceOracle,
    ) -> Result<LiquidationOutcome, EngineError> {
        let health = self.health_factor(owner, oracle)?;
        if health >= self.config.liquidation_threshold {
            return Err(EngineError::HealthFactorAboveThreshold);
        }
        let (found_owner, idx) = self.locate(position_id).ok_or(EngineError::NotFound)?;
        if found_owner != owner {
            return Err(EngineError::NotFound);
        }

        let collateral_price = checked_price(oracle, self.config.collateral_asset)?;
        let debt_price = checked_price(oracle, self.config.debt_asset)?;
        let position = self
            .books
            .get(&owner)
            .and_then(|b| b.positions.get(idx))
            .ok_or(EngineError::NotFound)?;

        let debt_value = mul_div(
            position.debt_amount,
            debt_price,
            PRICE_SCALE,
            Rounding::Up,
        )?;
        let seize_value = mul_div(
            debt_value,
            BPS_SCALE + self.config.liquidation_bonus_bps as u128,
            BPS_SCALE,
            Rounding::Down,
        )?;
        let seize_units = mul_div(seize_value, PRICE_SCALE, collateral_price, Rounding::Down)?;
        let seized = seize_units.min(position.collateral_amount);
        let returned = position.collateral_amount - seized;
        let debt_repaid = position.debt_amount;

        let removed = self.remove_at(owner, idx)?;
        Ok(LiquidationOutcome {
            position_id: removed.id,
            owner,
            payer,
            debt_repaid,
            collateral_seized: seized,
            collateral_returned: returned,
        })
    }
}
