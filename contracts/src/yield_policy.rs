//! # Yield Policy
//!
//! How much a `distribute_yield` call reinvests. The only policy shipped is
//! a flat rate on the pool position, a placeholder until real fee accrual
//! is modeled.

use pulse_protocol::config::YIELD_PLACEHOLDER_BPS;
use pulse_protocol::math::bps_of;
use pulse_protocol::types::{Amount, Bps};

use crate::valuation::ValuationSnapshot;

/// Decides the yield amount for a vault, given its current valuation.
pub trait YieldPolicy: Send + Sync {
    /// Base asset to reinvest. The controller clamps the result to the idle
    /// balance, so a policy may return more than is available.
    fn yield_amount(&self, snapshot: &ValuationSnapshot) -> Amount;
}

/// `pool_value * rate_bps / 10_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRateYield {
    /// Rate applied to the pool-position value.
    pub rate_bps: Bps,
}

impl Default for FixedRateYield {
    fn default() -> Self {
        Self {
            rate_bps: YIELD_PLACEHOLDER_BPS,
        }
    }
}

impl YieldPolicy for FixedRateYield {
    fn yield_amount(&self, snapshot: &ValuationSnapshot) -> Amount {
        // A u64 times a rate below 2^16 over 10_000 cannot overflow for
        // rates up to 10_000; larger rates saturate.
        bps_of(snapshot.pool_value, self.rate_bps).unwrap_or(Amount::MAX)
    }
}
