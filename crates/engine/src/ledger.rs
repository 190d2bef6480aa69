//! Vault share accounting.
//!
//! Converts between shares and underlying assets while resisting
//! donation-based share-price manipulation. Conversions apply a virtual
//! shares offset at every ratio, so the genesis depositor cannot make a
//! later depositor's mint collapse to dust by transferring assets in
//! directly. Untracked balance increases never reach the share price: they
//! are either rejected or quarantined, per configuration.
//!
//! Every operation computes all fallible results first and commits last,
//! so a returned error leaves the pre-operation state observable unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::math::{mul_div, MathError, Rounding};
use crate::types::{AssetId, OwnerId, PRICE_SCALE};

/// What to do with a balance increase no registered source explains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationPolicy {
    /// Reject the reconciliation outright.
    Reject,
    /// Hold the surplus outside the share price.
    Quarantine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub base_asset: AssetId,
    pub share_asset: AssetId,
    /// Acceptable underlying price band, 1e6 scale, strictly ordered.
    pub price_bound_low: u128,
    pub price_bound_high: u128,
    /// Non-redeemable shares mixed into every conversion ratio.
    pub virtual_shares_offset: u128,
    pub donation_policy: DonationPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_asset: AssetId(0),
            share_asset: AssetId(1),
            price_bound_low: PRICE_SCALE / 100,
            price_bound_high: PRICE_SCALE * 100,
            virtual_shares_offset: 1_000_000,
            donation_policy: DonationPolicy::Quarantine,
        }
    }
}

impl LedgerConfig {
    /// Degenerate markets are rejected at creation, never at first use.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.base_asset == self.share_asset {
            return Err(EngineError::DegenerateMarketConfig);
        }
        if self.price_bound_low >= self.price_bound_high {
            return Err(EngineError::DegenerateMarketConfig);
        }
        if self.virtual_shares_offset == 0 {
            return Err(EngineError::DegenerateMarketConfig);
        }
        Ok(())
    }
}

/// Result of reconciling against an externally observed balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDelta {
    InBalance,
    Quarantined(u128),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLedger {
    config: LedgerConfig,
    total_shares: u128,
    total_assets: u128,
    /// Untracked donations held outside the conversion ratio.
    quarantined_assets: u128,
    holder_balances: BTreeMap<OwnerId, u128>,
}

impl ShareLedger {
    pub fn create(config: LedgerConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            total_shares: 0,
            total_assets: 0,
            quarantined_assets: 0,
            holder_balances: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    pub fn total_assets(&self) -> u128 {
        self.total_assets
    }

    pub fn quarantined_assets(&self) -> u128 {
        self.quarantined_assets
    }

    pub fn balance_of(&self, owner: OwnerId) -> u128 {
        self.holder_balances.get(&owner).copied().unwrap_or(0)
    }

    pub fn holders(&self) -> impl Iterator<Item = (OwnerId, u128)> + '_ {
        self.holder_balances.iter().map(|(k, v)| (*k, *v))
    }

    fn virtual_shares(&self) -> Result<u128, EngineError> {
        self.total_shares
            .checked_add(self.config.virtual_shares_offset)
            .ok_or(EngineError::Math(MathError::Overflow))
    }

    fn virtual_assets(&self) -> Result<u128, EngineError> {
        self.total_assets
            .checked_add(1)
            .ok_or(EngineError::Math(MathError::Overflow))
    }

    /// Shares minted for `assets`, rounded against the depositor.
    pub fn shares_for_assets(&self, assets: u128) -> Result<u128, EngineError> {
        Ok(mul_div(
            assets,
            self.virtual_shares()?,
            self.virtual_assets()?,
            Rounding::Down,
        )?)
    }

    /// Assets paid for `shares`, rounded against the withdrawer.
    pub fn assets_for_shares(&self, shares: u128) -> Result<u128, EngineError> {
        Ok(mul_div(
            shares,
            self.virtual_assets()?,
            self.virtual_shares()?,
            Rounding::Down,
        )?)
    }

    /// 1e6-scaled assets-per-share ratio, for tolerance checks.
    pub fn share_price(&self) -> Result<u128, EngineError> {
        Ok(mul_div(
            self.virtual_assets()?,
            PRICE_SCALE,
            self.virtual_shares()?,
            Rounding::Down,
        )?)
    }

    /// Mint shares for a deposit. A computed mint of zero shares for a
    /// non-zero amount is rejected, never silently accepted.
    pub fn deposit(&mut self, depositor: OwnerId, assets: u128) -> Result<u128, EngineError> {
        let shares = self.shares_for_assets(assets)?;
        if shares == 0 && assets > 0 {
            return Err(EngineError::ZeroShareMint);
        }
        let new_assets = self
            .total_assets
            .checked_add(assets)
            .ok_or(EngineError::Math(MathError::Overflow))?;
        let new_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(EngineError::Math(MathError::Overflow))?;
        let held = self.balance_of(depositor);
        let new_held = held
            .checked_add(shares)
            .ok_or(EngineError::Math(MathError::Overflow))?;

        self.total_assets = new_assets;
        self.total_shares = new_shares;
        self.holder_balances.insert(depositor, new_held);
        Ok(shares)
    }

    /// Burn shares for assets at the current ratio.
    pub fn withdraw(&mut self, owner: OwnerId, shares: u128) -> Result<u128, EngineError> {
        let held = self.balance_of(owner);
        if shares > held {
            return Err(EngineError::InsufficientShares);
        }
        let assets = self.assets_for_shares(shares)?;
        if assets > self.total_assets {
            return Err(EngineError::InsufficientAssets);
        }

        self.total_assets -= assets;
        self.total_shares -= shares;
        self.holder_balances.insert(owner, held - shares);
        Ok(assets)
    }

    /// Fold released (already time-smoothed) profit into the share price.
    pub fn credit_yield(&mut self, amount: u128) -> Result<(), EngineError> {
        self.total_assets = self
            .total_assets
            .checked_add(amount)
            .ok_or(EngineError::Math(MathError::Overflow))?;
        Ok(())
    }

    /// Handle an untracked donation per policy. Declared yield never goes
    /// through here; the caller routes it to the reward stream.
    pub fn donate(&mut self, amount: u128) -> Result<u128, EngineError> {
        match self.config.donation_policy {
            DonationPolicy::Reject => Err(EngineError::UntrackedDonation),
            DonationPolicy::Quarantine => {
                self.quarantined_assets = self
                    .quarantined_assets
                    .checked_add(amount)
                    .ok_or(EngineError::Math(MathError::Overflow))?;
                Ok(amount)
            }
        }
    }

    /// Reconcile against an externally observed balance. A shortfall is an
    /// error; an unexplained surplus is classified as an untracked
    /// donation and follows the configured policy. The surplus is never
    /// merged into the share price.
    pub fn sync(&mut self, observed_assets: u128) -> Result<SyncDelta, EngineError> {
        let accounted = self
            .total_assets
            .checked_add(self.quarantined_assets)
            .ok_or(EngineError::Math(MathError::Overflow))?;
        if observed_assets < accounted {
            return Err(EngineError::InsufficientAssets);
        }
        let surplus = observed_assets - accounted;
        if surplus == 0 {
            return Ok(SyncDelta::InBalance);
        }
        self.donate(surplus).map(SyncDelta::Quarantined)
    }
}
