//! # Fixed-Point Arithmetic
//!
//! Every proportional computation in the vault is `a * b / c` on `u64`
//! amounts. The product is formed in `u128` so it cannot overflow, and the
//! quotient is narrowed back with an explicit check. Rounding direction is
//! always chosen by the caller -- the default everywhere in the vault is
//! [`Rounding::Down`], which never favors the party receiving the result.

use thiserror::Error;

use crate::config::BPS_DENOMINATOR;
use crate::types::{Amount, Bps};

/// Errors from fixed-point helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    /// The divisor was zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The result does not fit in a `u64`.
    #[error("arithmetic overflow: result exceeds u64::MAX")]
    Overflow,
}

/// Direction of integer-division rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Truncate toward zero.
    Down,
    /// Round toward positive infinity.
    Up,
}

/// Computes `a * b / denominator` with a 128-bit intermediate.
pub fn mul_div(
    a: Amount,
    b: Amount,
    denominator: Amount,
    rounding: Rounding,
) -> Result<Amount, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = a as u128 * b as u128;
    let d = denominator as u128;
    let mut quotient = product / d;
    if rounding == Rounding::Up && product % d != 0 {
        quotient += 1;
    }
    u64::try_from(quotient).map_err(|_| MathError::Overflow)
}

/// `a * b / denominator`, rounded down.
pub fn mul_div_floor(a: Amount, b: Amount, denominator: Amount) -> Result<Amount, MathError> {
    mul_div(a, b, denominator, Rounding::Down)
}

/// `amount * bps / 10_000`, rounded down.
pub fn bps_of(amount: Amount, bps: Bps) -> Result<Amount, MathError> {
    mul_div_floor(amount, bps as Amount, BPS_DENOMINATOR)
}

/// Minimum acceptable output for an expected amount under a slippage
/// tolerance: `expected * (10_000 - tolerance) / 10_000`, rounded down.
///
/// Tolerances above 100% clamp to a floor of zero.
pub fn slippage_floor(expected: Amount, max_slippage_bps: Bps) -> Result<Amount, MathError> {
    let keep = BPS_DENOMINATOR.saturating_sub(max_slippage_bps as Amount);
    mul_div_floor(expected, keep, BPS_DENOMINATOR)
}

/// Integer square root (floor) by Newton's method.
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}
