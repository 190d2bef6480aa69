//! Deterministic financial invariant simulation engine.
//!
//! Models the accounting core shared by vault-style protocols: share/asset
//! conversion, time-weighted reward release, and per-owner leveraged
//! positions with liquidation gating. Everything is single-threaded, pure,
//! and driven by explicit events; time only moves when an event says so.
//! No I/O, no wall clock, no panics on the non-test path.

pub mod error;
pub mod events;
pub mod harness;
pub mod invariants;
pub mod ledger;
pub mod math;
pub mod oracle;
pub mod positions;
pub mod smoother;
pub mod types;

// Re-export the types a driver needs
pub use error::{EngineError, MathError};
pub use events::{AppliedEffect, Event, StepOutcome, StepResult};
pub use harness::{EngineConfig, InvariantHarness, InvariantReport, Snapshot};
pub use invariants::Violation;
pub use ledger::{DonationPolicy, LedgerConfig, ShareLedger, SyncDelta};
pub use math::{div_rounding_up, mul_div, mul_div_with_remainder, Rounding};
pub use oracle::{checked_price, FixedPriceOracle, PriceOracle};
pub use positions::{
    GraphConfig, LiquidationOutcome, Position, PositionGraph, PositionKind, PositionTerms,
    HEALTH_EVAL_COST, MAX_POSITIONS_PER_OWNER,
};
pub use smoother::{RewardSmoother, StreamPhase};
pub use types::{AssetId, OwnerId, PositionId, PRICE_SCALE};
