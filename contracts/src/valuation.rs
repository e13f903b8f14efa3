//! # Asset Valuation
//!
//! What is the vault worth right now? Idle base asset plus the base-side
//! claim of its pool position at the pool's current reserves:
//!
//! ```text
//! total_assets = idle_balance + units * reserve_base / pool_total_supply
//! ```
//!
//! The pool is an unordered pair, so the base reserve is found by asset id,
//! never by slot position.

use std::sync::Arc;

use pulse_protocol::math::{mul_div, mul_div_floor, Rounding};
use pulse_protocol::pool::PoolPair;
use pulse_protocol::types::{Amount, AssetId};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::state::VaultState;

/// One consistent read of the pool, oriented to the vault's assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Reserve of the vault's base asset.
    pub reserve_base: Amount,
    /// Reserve of the vault's quote asset.
    pub reserve_quote: Amount,
    /// Total pool-position units in existence.
    pub total_supply: Amount,
}

/// A full valuation of the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    /// Base asset held directly.
    pub idle_balance: Amount,
    /// Pool-position units held.
    pub pool_position_units: Amount,
    /// Base-denominated value of those units.
    pub pool_value: Amount,
    /// `idle_balance + pool_value`.
    pub total_assets: Amount,
}

/// Values a vault's holdings against its pool.
pub struct AssetValuator {
    pair: Arc<dyn PoolPair>,
    base_asset: AssetId,
    quote_asset: AssetId,
}

impl AssetValuator {
    /// Creates a valuator for the given pair and asset identities.
    pub fn new(pair: Arc<dyn PoolPair>, base_asset: AssetId, quote_asset: AssetId) -> Self {
        Self {
            pair,
            base_asset,
            quote_asset,
        }
    }

    /// Reads reserves and supply, oriented base/quote.
    ///
    /// # Errors
    ///
    /// [`VaultError::ConfigurationError`] if the pair does not trade
    /// exactly the vault's base and quote assets.
    pub fn pool_snapshot(&self) -> Result<PoolSnapshot, VaultError> {
        let reserves = self.pair.reserves();
        let (a, b) = (self.pair.asset_a(), self.pair.asset_b());
        let (reserve_base, reserve_quote, other) = if a == &self.base_asset {
            (reserves.reserve_a, reserves.reserve_b, b)
        } else if b == &self.base_asset {
            (reserves.reserve_b, reserves.reserve_a, a)
        } else {
            return Err(VaultError::ConfigurationError(format!(
                "pool {}/{} has no {} reserve",
                a, b, self.base_asset
            )));
        };
        if other != &self.quote_asset {
            return Err(VaultError::ConfigurationError(format!(
                "pool pairs {} with {}, expected {}",
                self.base_asset, other, self.quote_asset
            )));
        }
        Ok(PoolSnapshot {
            reserve_base,
            reserve_quote,
            total_supply: self.pair.total_supply(),
        })
    }

    /// Base-side value of `units` at `snapshot`, rounded down.
    pub fn value_of_units(&self, units: Amount, snapshot: &PoolSnapshot) -> Result<Amount, VaultError> {
        if units == 0 {
            return Ok(0);
        }
        if snapshot.total_supply == 0 {
            return Err(VaultError::ExternalCallFailed(
                "pool reports zero position supply while the vault holds units".into(),
            ));
        }
        Ok(mul_div_floor(units, snapshot.reserve_base, snapshot.total_supply)?)
    }

    /// Units whose base-side value is `value` at `snapshot`. The inverse of
    /// [`value_of_units`](Self::value_of_units).
    pub fn units_for_value(
        &self,
        value: Amount,
        snapshot: &PoolSnapshot,
        rounding: Rounding,
    ) -> Result<Amount, VaultError> {
        if value == 0 {
            return Ok(0);
        }
        if snapshot.reserve_base == 0 {
            return Err(VaultError::ExternalCallFailed(
                "pool holds no base reserve".into(),
            ));
        }
        Ok(mul_div(value, snapshot.total_supply, snapshot.reserve_base, rounding)?)
    }

    /// Value of the vault's pool position. Skips the pool entirely when the
    /// vault holds no units.
    pub fn value_of_pool_position(&self, state: &VaultState) -> Result<Amount, VaultError> {
        if state.pool_position_units == 0 {
            return Ok(0);
        }
        let snapshot = self.pool_snapshot()?;
        self.value_of_units(state.pool_position_units, &snapshot)
    }

    /// `idle_balance + value_of_pool_position()`.
    pub fn total_assets(&self, state: &VaultState) -> Result<Amount, VaultError> {
        Ok(self.valuation(state)?.total_assets)
    }

    /// Full valuation breakdown.
    pub fn valuation(&self, state: &VaultState) -> Result<ValuationSnapshot, VaultError> {
        let pool_value = self.value_of_pool_position(state)?;
        let total_assets = state
            .idle_balance
            .checked_add(pool_value)
            .ok_or(VaultError::ArithmeticOverflow)?;
        Ok(ValuationSnapshot {
            idle_balance: state.idle_balance,
            pool_position_units: state.pool_position_units,
            pool_value,
            total_assets,
        })
    }
}
