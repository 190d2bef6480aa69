//! Engine error taxonomy.
//!
//! Every rejected operation returns one of these stable kinds with the
//! pre-operation state unchanged. Nothing is thrown across component
//! boundaries and no component recovers from another component's error.

use serde::Serialize;
use thiserror::Error;

pub use crate::math::MathError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum EngineError {
    /// Deposit would mint zero shares for a non-zero asset amount.
    #[error("deposit would mint zero shares")]
    ZeroShareMint,

    /// Equal asset identities, non-strictly-ordered price bounds, or an
    /// otherwise self-referential market configuration. Rejected at
    /// creation, never deferred to first use.
    #[error("degenerate market configuration")]
    DegenerateMarketConfig,

    #[error("insufficient shares for withdrawal")]
    InsufficientShares,

    #[error("insufficient assets for conversion")]
    InsufficientAssets,

    /// Balance increase not explained by any registered source, with the
    /// ledger configured to reject rather than quarantine it.
    #[error("untracked donation rejected")]
    UntrackedDonation,

    #[error("per-owner position cap reached")]
    CapacityExceeded,

    /// Third party attempted to open a position for an unconsenting owner.
    #[error("owner consent required")]
    ConsentRequired,

    /// Price feed failed or returned a non-positive value.
    #[error("price oracle unavailable")]
    OracleUnavailable,

    #[error("health factor above liquidation threshold")]
    HealthFactorAboveThreshold,

    #[error("position not found")]
    NotFound,

    #[error("caller is not the position owner")]
    NotOwner,

    #[error(transparent)]
    Math(#[from] MathError),
}

impl EngineError {
    /// Stable name for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ZeroShareMint => "ZeroShareMint",
            EngineError::DegenerateMarketConfig => "DegenerateMarketConfig",
            EngineError::InsufficientShares => "InsufficientShares",
            EngineError::InsufficientAssets => "InsufficientAssets",
            EngineError::UntrackedDonation => "UntrackedDonation",
            EngineError::CapacityExceeded => "CapacityExceeded",
            EngineError::ConsentRequired => "ConsentRequired",
            EngineError::OracleUnavailable => "OracleUnavailable",
            EngineError::HealthFactorAboveThreshold => "HealthFactorAboveThreshold",
            EngineError::NotFound => "NotFound",
            EngineError::NotOwner => "NotOwner",
            EngineError::Math(MathError::Overflow) => "Overflow",
            EngineError::Math(MathError::DivisionByZero) => "DivisionByZero",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_error_converts() {
        let err: EngineError = MathError::Overflow.into();
        assert_eq!(err.kind(), "Overflow");
        assert_eq!(EngineError::ZeroShareMint.kind(), "ZeroShareMint");
    }
}
