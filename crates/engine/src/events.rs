//! Simulation events and per-step results.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::positions::{LiquidationOutcome, PositionTerms};
use crate::types::{AssetId, OwnerId, PositionId};

/// One entry of the replayed event sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Deposit {
        owner: OwnerId,
        assets: u128,
    },
    Withdraw {
        owner: OwnerId,
        shares: u128,
    },
    /// Assets arriving outside deposit flow. `declared` donations are
    /// registered yield and go through the reward stream; undeclared ones
    /// follow the ledger's donation policy.
    Donate {
        amount: u128,
        declared: bool,
    },
    /// Release due profit and, when an observed balance is supplied,
    /// reconcile the ledger against it first.
    Sync {
        #[serde(default)]
        observed_assets: Option<u128>,
    },
    AdvanceTime {
        by: u64,
    },
    OpenPosition {
        caller: OwnerId,
        owner: OwnerId,
        terms: PositionTerms,
    },
    ClosePosition {
        caller: OwnerId,
        position_id: PositionId,
    },
    AuthorizeCreator {
        owner: OwnerId,
        creator: OwnerId,
    },
    Liquidate {
        payer: OwnerId,
        owner: OwnerId,
        position_id: PositionId,
    },
    SetPrice {
        asset: AssetId,
        price: u128,
    },
}

/// What a successfully applied event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedEffect {
    SharesMinted { shares: u128 },
    AssetsWithdrawn { assets: u128 },
    ProfitAccrued { amount: u128 },
    DonationQuarantined { amount: u128 },
    ProfitReleased { amount: u128, quarantined: u128 },
    TimeAdvanced { now: u64 },
    PositionOpened { position_id: PositionId },
    PositionClosed { position_id: PositionId },
    CreatorAuthorized { owner: OwnerId, creator: OwnerId },
    Liquidated(LiquidationOutcome),
    PriceSet { asset: AssetId, price: u128 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied { effect: AppliedEffect },
    /// The event was rejected with a stable error kind; state is the
    /// pre-event state, and replay continues with the next event.
    Rejected { error: EngineError },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub index: usize,
    pub event: Event,
    pub outcome: StepOutcome,
}

impl StepResult {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, StepOutcome::Applied { .. })
    }

    pub fn error(&self) -> Option<EngineError> {
        match self.outcome {
            StepOutcome::Rejected { error } => Some(error),
            StepOutcome::Applied { .. } => None,
        }
    }
}
