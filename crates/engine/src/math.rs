//! Scaled-integer arithmetic with explicit rounding.
//!
//! All products go through a 256-bit intermediate so `a * b / denominator`
//! only fails when the final quotient does not fit `u128`. Every fallible
//! path returns a typed error; nothing in here panics.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
}

/// Rounding policy for `mul_div`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
    /// Round half away from zero (ties up).
    Nearest,
}

/// Full 256-bit product of two u128 values as (hi, lo) limbs.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = (1u128 << 64) - 1;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (mid << 64) | (ll & MASK);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// Restoring division of a 256-bit value by a u128 divisor.
/// Caller guarantees `divisor != 0` and `hi < divisor` (quotient fits u128).
fn div_rem_wide(hi: u128, lo: u128, divisor: u128) -> (u128, u128) {
    if hi == 0 {
        return (lo / divisor, lo % divisor);
    }
    let mut rem = hi;
    let mut quot = 0u128;
    for i in (0..128).rev() {
        // Track the bit shifted out of rem; if set, the true remainder
        // exceeds 2^128 and the subtraction below always applies.
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        if carry == 1 || rem >= divisor {
            rem = rem.wrapping_sub(divisor);
            quot |= 1u128 << i;
        }
    }
    (quot, rem)
}

/// `a * b / denominator` with 256-bit intermediate precision.
///
/// Fails with `DivisionByZero` when `denominator == 0` and with `Overflow`
/// when the rounded quotient does not fit in 128 bits.
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128, MathError> {
    let (quot, rem) = mul_div_with_remainder(a, b, denominator)?;
    let bump = match rounding {
        Rounding::Down => false,
        Rounding::Up => rem > 0,
        Rounding::Nearest => rem != 0 && rem >= denominator - rem,
    };
    if bump {
        quot.checked_add(1).ok_or(MathError::Overflow)
    } else {
        Ok(quot)
    }
}

/// `a * b / denominator` returning the truncated quotient together with the
/// remainder `(a * b) % denominator`, so callers can carry dust forward
/// across repeated calls instead of discarding it.
pub fn mul_div_with_remainder(
    a: u128,
    b: u128,
    denominator: u128,
) -> Result<(u128, u128), MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let (hi, lo) = mul_wide(a, b);
    if hi >= denominator {
        // Quotient needs more than 128 bits.
        return Err(MathError::Overflow);
    }
    Ok(div_rem_wide(hi, lo, denominator))
}

/// `ceil(a / b)`.
pub fn div_rounding_up(a: u128, b: u128) -> Result<u128, MathError> {
    if b == 0 {
        return Err(MathError::DivisionByZero);
    }
    if a == 0 {
        return Ok(0);
    }
    Ok((a - 1) / b + 1)
}
