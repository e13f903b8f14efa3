//! # Protocol Configuration & Constants
//!
//! Every magic number in MarketPulse lives here. If you're hardcoding a
//! basis-point value somewhere else, move it here.
//!
//! Bounds are enforced at vault creation and on every owner-driven
//! configuration change. Defaults match what the factory hands out when a
//! vault is created without explicit parameters.

// ---------------------------------------------------------------------------
// Basis Points
// ---------------------------------------------------------------------------

/// 10_000 bps = 100%. Used as the denominator for every fee, allocation and
/// slippage computation.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Upper bound for the target pool allocation. 100% is allowed: an
/// all-in vault keeps no idle buffer and withdraws straight from the pool.
pub const MAX_TARGET_ALLOCATION_BPS: u16 = 10_000;

/// Default share of total assets to hold in the pool (80%).
pub const DEFAULT_TARGET_ALLOCATION_BPS: u16 = 8_000;

/// Default slippage tolerance for pool operations (1%).
pub const DEFAULT_MAX_SLIPPAGE_BPS: u16 = 100;

/// Largest slippage tolerance an owner may configure (50%). Anything
/// looser is not a floor, it's a donation.
pub const MAX_SLIPPAGE_BPS: u16 = 5_000;

/// Default treasury fee charged on withdrawals (0.5%).
pub const DEFAULT_TREASURY_FEE_BPS: u16 = 50;

/// Largest treasury fee a factory may be configured with (10%).
pub const MAX_TREASURY_FEE_BPS: u16 = 1_000;

/// Default drift band around the target allocation inside which
/// rebalancing is a no-op. Zero means only exact equality is "on target".
pub const DEFAULT_REBALANCE_THRESHOLD_BPS: u16 = 0;

/// Widest drift band an owner may configure.
pub const MAX_REBALANCE_THRESHOLD_BPS: u16 = 5_000;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Execution window handed to the router on every add/remove. The pool
/// refuses to execute after `now + LIQUIDITY_DEADLINE_SECS`.
pub const LIQUIDITY_DEADLINE_SECS: i64 = 300;

/// Default vault lifetime before deposits close (30 days).
pub const DEFAULT_VAULT_LIFETIME_SECS: i64 = 30 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Yield
// ---------------------------------------------------------------------------

/// Placeholder yield rate: 0.1% of the pool-position value per
/// distribution. There is no historical baseline to measure realized gains
/// against, so this is a fixed policy stub and nothing more.
pub const YIELD_PLACEHOLDER_BPS: u16 = 10;

// ---------------------------------------------------------------------------
// Display / Pools
// ---------------------------------------------------------------------------

/// Fixed-point scale for reported share prices: a price of 1.0 base unit
/// per share is reported as `SHARE_PRICE_SCALE`.
pub const SHARE_PRICE_SCALE: u64 = 1_000_000_000;

/// Swap fee charged by the in-memory constant-product pool (0.3%, the
/// classic V2 fee).
pub const DEFAULT_SWAP_FEE_BPS: u16 = 30;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_within_bounds() {
        assert!(DEFAULT_TARGET_ALLOCATION_BPS <= MAX_TARGET_ALLOCATION_BPS);
        assert!(DEFAULT_MAX_SLIPPAGE_BPS <= MAX_SLIPPAGE_BPS);
        assert!(DEFAULT_TREASURY_FEE_BPS <= MAX_TREASURY_FEE_BPS);
        assert!(DEFAULT_REBALANCE_THRESHOLD_BPS <= MAX_REBALANCE_THRESHOLD_BPS);
    }

    #[test]
    fn test_bounds_fit_the_denominator() {
        // A bound above 100% would let a fee eat more than the whole amount.
        assert!(MAX_TARGET_ALLOCATION_BPS as u64 <= BPS_DENOMINATOR);
        assert!((MAX_SLIPPAGE_BPS as u64) < BPS_DENOMINATOR);
        assert!((MAX_TREASURY_FEE_BPS as u64) < BPS_DENOMINATOR);
    }

    #[test]
    fn test_timing_constants_sanity() {
        assert!(LIQUIDITY_DEADLINE_SECS > 0);
        assert!(DEFAULT_VAULT_LIFETIME_SECS > LIQUIDITY_DEADLINE_SECS);
    }
}
