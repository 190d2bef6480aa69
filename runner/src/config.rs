//! Scenario configuration
//!
//! Scenarios are TOML files: a handful of engine knobs plus an ordered
//! `[[events]]` list. TOML integers are i64, so amounts here are u64 and
//! widen into the engine's u128 on conversion.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sim_engine::{
    AssetId, DonationPolicy, EngineConfig, Event, OwnerId, PositionId, PositionKind, PositionTerms,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Label printed in the report header
    pub name: String,

    /// Reward smoothing period in simulated time units
    pub smoothing_period: u64,

    /// Allowed per-event share price drift in basis points
    pub price_tolerance_bps: u32,

    /// Virtual shares mixed into every conversion ratio
    pub virtual_shares_offset: u64,

    /// What happens to undeclared asset arrivals
    pub donation_policy: DonationPolicy,

    /// Owners whose aggregate health drops below this are flagged (1e6 scale)
    pub health_alert_threshold: u64,

    /// Ordered event sequence to replay
    pub events: Vec<ScenarioEvent>,
}

/// TOML-friendly mirror of [`sim_engine::Event`] with u64 amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioEvent {
    Deposit {
        owner: u64,
        assets: u64,
    },
    Withdraw {
        owner: u64,
        shares: u64,
    },
    Donate {
        amount: u64,
        declared: bool,
    },
    Sync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        observed_assets: Option<u64>,
    },
    AdvanceTime {
        by: u64,
    },
    OpenPosition {
        caller: u64,
        owner: u64,
        kind: PositionKind,
        collateral: u64,
        debt: u64,
        #[serde(default)]
        range_low: u64,
        #[serde(default)]
        range_high: u64,
    },
    ClosePosition {
        caller: u64,
        position_id: u64,
    },
    AuthorizeCreator {
        owner: u64,
        creator: u64,
    },
    Liquidate {
        payer: u64,
        owner: u64,
        position_id: u64,
    },
    SetPrice {
        asset: u32,
        price: u64,
    },
}

impl From<ScenarioEvent> for Event {
    fn from(event: ScenarioEvent) -> Self {
        match event {
            ScenarioEvent::Deposit { owner, assets } => Event::Deposit {
                owner: OwnerId(owner),
                assets: assets.into(),
            },
            ScenarioEvent::Withdraw { owner, shares } => Event::Withdraw {
                owner: OwnerId(owner),
                shares: shares.into(),
            },
            ScenarioEvent::Donate { amount, declared } => Event::Donate {
                amount: amount.into(),
                declared,
            },
            ScenarioEvent::Sync { observed_assets } => Event::Sync {
                observed_assets: observed_assets.map(u128::from),
            },
            ScenarioEvent::AdvanceTime { by } => Event::AdvanceTime { by },
            ScenarioEvent::OpenPosition {
                caller,
                owner,
                kind,
                collateral,
                debt,
                range_low,
                range_high,
            } => Event::OpenPosition {
                caller: OwnerId(caller),
                owner: OwnerId(owner),
                terms: PositionTerms {
                    kind,
                    collateral_amount: collateral.into(),
                    debt_amount: debt.into(),
                    price_range_low: range_low.into(),
                    price_range_high: range_high.into(),
                },
            },
            ScenarioEvent::ClosePosition { caller, position_id } => Event::ClosePosition {
                caller: OwnerId(caller),
                position_id: PositionId(position_id),
            },
            ScenarioEvent::AuthorizeCreator { owner, creator } => Event::AuthorizeCreator {
                owner: OwnerId(owner),
                creator: OwnerId(creator),
            },
            ScenarioEvent::Liquidate {
                payer,
                owner,
                position_id,
            } => Event::Liquidate {
                payer: OwnerId(payer),
                owner: OwnerId(owner),
                position_id: PositionId(position_id),
            },
            ScenarioEvent::SetPrice { asset, price } => Event::SetPrice {
                asset: AssetId(asset),
                price: price.into(),
            },
        }
    }
}

impl Scenario {
    /// Load a scenario from a TOML file
    pub fn load() -> Result<Self> {
        let path = std::env::var("SIM_SCENARIO").unwrap_or_else(|_| "scenario.toml".to_string());

        let raw = std::fs::read_to_string(&path)
            .context(format!("Failed to read scenario file: {}", path))?;

        let scenario: Scenario = toml::from_str(&raw).context("Failed to parse scenario TOML")?;

        Ok(scenario)
    }

    /// Built-in deposit/donate/crash/liquidate walkthrough
    pub fn default_demo() -> Self {
        Self {
            name: "demo".to_string(),
            smoothing_period: 86_400,
            price_tolerance_bps: 10,
            virtual_shares_offset: 1_000_000,
            donation_policy: DonationPolicy::Quarantine,
            health_alert_threshold: 1_100_000, // alert within 10% of threshold
            events: vec![
                ScenarioEvent::SetPrice { asset: 2, price: 2_000_000 },
                ScenarioEvent::SetPrice { asset: 3, price: 1_000_000 },
                ScenarioEvent::Deposit { owner: 1, assets: 1_000_000 },
                ScenarioEvent::Donate { amount: 100_000, declared: true },
                ScenarioEvent::AdvanceTime { by: 86_400 },
                ScenarioEvent::Sync { observed_assets: None },
                ScenarioEvent::OpenPosition {
                    caller: 1,
                    owner: 1,
                    kind: PositionKind::Simple,
                    collateral: 1_000,
                    debt: 900,
                    range_low: 0,
                    range_high: 0,
                },
                ScenarioEvent::SetPrice { asset: 2, price: 800_000 },
                ScenarioEvent::Liquidate { payer: 2, owner: 1, position_id: 0 },
            ],
        }
    }

    /// Engine settings for this scenario
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.ledger.virtual_shares_offset = self.virtual_shares_offset.into();
        config.ledger.donation_policy = self.donation_policy;
        config.smoothing_period = self.smoothing_period;
        config.price_tolerance_bps = self.price_tolerance_bps;
        config
    }
}
