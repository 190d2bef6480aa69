//! Time-weighted reward release.
//!
//! Accrued profit is released along an absolute cumulative schedule keyed
//! to the time the profit was observed, so the amount a stream has paid
//! out by time T is the same no matter how the interval was chopped into
//! sync calls. Each sync pays `target(T) - already_released`; the
//! sub-period remainder of T is never applied a second time against the
//! freshly reduced balance inside one call.
//!
//! Schedule for profit P accrued at the window start, period p:
//! - T < p: linear, `P * T / 2p`
//! - T >= p: `P * n / (n + 1)` with `n = ceil(T / p)` counted once
//! - T >= CLAMP_PERIODS * p: everything, stream goes idle

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::math::{div_rounding_up, mul_div, mul_div_with_remainder, MathError, Rounding};

/// Elapsed times beyond this many periods release 100% and idle the
/// stream instead of erroring.
pub const CLAMP_PERIODS: u128 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    /// No unreleased profit.
    Idle,
    /// Unreleased profit, within the current window.
    Accruing,
    /// One or more full periods elapsed since the window opened.
    WindowExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSmoother {
    smoothing_period: u64,
    /// Time the current profit batch was observed.
    window_start: u64,
    /// Profit at the window start.
    initial_profit: u128,
    /// Cumulative release since the window start.
    released: u128,
    last_synced_time: u64,
}

impl RewardSmoother {
    pub fn new(smoothing_period: u64, now: u64) -> Result<Self, EngineError> {
        if smoothing_period == 0 {
            return Err(EngineError::DegenerateMarketConfig);
        }
        Ok(Self {
            smoothing_period,
            window_start: now,
            initial_profit: 0,
            released: 0,
            last_synced_time: now,
        })
    }

    pub fn smoothing_period(&self) -> u64 {
        self.smoothing_period
    }

    pub fn last_synced_time(&self) -> u64 {
        self.last_synced_time
    }

    /// Profit at the start of the current window.
    pub fn window_profit(&self) -> u128 {
        self.initial_profit
    }

    /// Cumulative release since the current window opened.
    pub fn released_so_far(&self) -> u128 {
        self.released
    }

    /// Profit accrued but not yet released.
    pub fn unreleased(&self) -> u128 {
        self.initial_profit - self.released
    }

    /// Time left in the current release window.
    pub fn remaining_period(&self, now: u64) -> u64 {
        let elapsed = now.saturating_sub(self.window_start);
        self.smoothing_period.saturating_sub(elapsed)
    }

    pub fn phase(&self, now: u64) -> StreamPhase {
        if self.unreleased() == 0 {
            StreamPhase::Idle
        } else if now.saturating_sub(self.window_start) >= self.smoothing_period {
            StreamPhase::WindowExpired
        } else {
            StreamPhase::Accruing
        }
    }

    /// Fold new profit in. The unreleased remainder and the new profit
    /// start a fresh window at `now`.
    pub fn accrue(&mut self, amount: u128, now: u64) -> Result<(), EngineError> {
        let pending = self
            .unreleased()
            .checked_add(amount)
            .ok_or(EngineError::Math(MathError::Overflow))?;
        self.initial_profit = pending;
        self.released = 0;
        self.window_start = now;
        self.last_synced_time = now;
        Ok(())
    }

    /// Release the portion of stored profit the schedule says is due at
    /// `now`. Calling twice at the same time is a no-op returning 0.
    pub fn sync(&mut self, now: u64) -> Result<u128, EngineError> {
        if now <= self.last_synced_time {
            return Ok(0);
        }
        self.last_synced_time = now;
        if self.unreleased() == 0 {
            return Ok(0);
        }
        let elapsed = now - self.window_start;
        let target = self.target_released(elapsed)?;
        let due = target.saturating_sub(self.released);
        self.released += due;
        Ok(due)
    }

    /// Cumulative release the schedule mandates after `elapsed` time.
    fn target_released(&self, elapsed: u64) -> Result<u128, EngineError> {
        let p = self.smoothing_period as u128;
        let t = elapsed as u128;
        if t == 0 {
            return Ok(0);
        }
        if t >= p.saturating_mul(CLAMP_PERIODS) {
            // Astronomical elapsed time: treat as infinitely many periods.
            return Ok(self.initial_profit);
        }
        if t >= p {
            let n = div_rounding_up(t, p)?;
            // The n/(n+1) fraction is computed exactly once; the remainder
            // stays with the quotient's dust instead of being re-applied.
            let (due, _dust) = mul_div_with_remainder(self.initial_profit, n, n + 1)?;
            Ok(due)
        } else {
            // Linear within the window, continuous with n = 1 at t == p.
            Ok(mul_div(self.initial_profit, t, 2 * p, Rounding::Down)?)
        }
    }
}
