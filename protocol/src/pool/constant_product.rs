//! # Constant-Product Pool
//!
//! A V2-style `x * y = k` pair that is also its own router. Reserves are
//! the pool account's balances on the shared [`AssetLedger`], and position
//! units are an ordinary ledger asset minted by the pool. Because all of
//! its state lives on the ledger, a ledger rollback rolls the pool back too.
//!
//! Pricing rules, in the order the router applies them:
//!
//! 1. `quote` -- proportional, fee-free: `amount * reserve_out / reserve_in`.
//! 2. `add_liquidity` -- deposits at the current ratio, taking all of one
//!    side and the optimal amount of the other; the first deposit mints
//!    `sqrt(a * b)` units, later ones `min(a * S / ra, b * S / rb)`.
//! 3. `remove_liquidity` -- pays out `units * reserve / S` of each side.
//! 4. `swap` -- constant product with a fee on the input.
//!
//! All divisions round down, which always favors the pool.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use super::{
    AddLiquidityOutcome, AddLiquidityRequest, PoolError, PoolPair, PoolRouter, Reserves,
    RemoveLiquidityOutcome, RemoveLiquidityRequest,
};
use crate::clock::Clock;
use crate::config::{BPS_DENOMINATOR, DEFAULT_SWAP_FEE_BPS};
use crate::ledger::{AssetInfo, AssetLedger};
use crate::math::{isqrt, mul_div_floor, MathError};
use crate::types::{Address, Amount, AssetId, Bps};

/// Decimals of the position token. Display only.
const POSITION_DECIMALS: u8 = 18;

/// An in-memory constant-product pair plus router.
pub struct ConstantProductPool {
    address: Address,
    asset_a: AssetId,
    asset_b: AssetId,
    position_asset: AssetId,
    swap_fee_bps: Bps,
    ledger: Arc<dyn AssetLedger>,
    clock: Arc<dyn Clock>,
    updated_at: RwLock<DateTime<Utc>>,
}

impl std::fmt::Debug for ConstantProductPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantProductPool")
            .field("address", &self.address)
            .field("asset_a", &self.asset_a)
            .field("asset_b", &self.asset_b)
            .field("position_asset", &self.position_asset)
            .field("swap_fee_bps", &self.swap_fee_bps)
            .finish()
    }
}

impl ConstantProductPool {
    /// Creates an empty pair at `address` and registers its position token
    /// on the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::UnknownPair`] if both sides are the same asset,
    /// or a ledger error if the position token id is already taken.
    pub fn new(
        ledger: Arc<dyn AssetLedger>,
        clock: Arc<dyn Clock>,
        address: Address,
        asset_a: AssetId,
        asset_b: AssetId,
    ) -> Result<Self, PoolError> {
        if asset_a == asset_b {
            return Err(PoolError::UnknownPair(asset_a, asset_b));
        }
        let position_asset = AssetId::new(format!("{}-LP", address));
        ledger.register_asset(
            AssetInfo::new(
                position_asset.clone(),
                format!("{}/{} pool position", asset_a, asset_b),
                format!("{}-{}-LP", asset_a, asset_b),
                POSITION_DECIMALS,
            ),
            address.clone(),
        )?;
        let updated_at = RwLock::new(clock.now());
        Ok(Self {
            address,
            asset_a,
            asset_b,
            position_asset,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
            ledger,
            clock,
            updated_at,
        })
    }

    /// Overrides the swap fee.
    pub fn with_swap_fee(mut self, fee_bps: Bps) -> Self {
        self.swap_fee_bps = fee_bps;
        self
    }

    /// The pool's own ledger account.
    pub fn pool_address(&self) -> &Address {
        &self.address
    }

    /// Swaps `amount_in` of `asset_in` for the other side of the pair.
    /// `trader` pays directly (no allowance) and receives the output.
    ///
    /// # Errors
    ///
    /// [`PoolError::Slippage`] if the output is below `min_out`.
    pub fn swap(
        &self,
        trader: &Address,
        asset_in: &AssetId,
        amount_in: Amount,
        min_out: Amount,
    ) -> Result<Amount, PoolError> {
        let asset_out = if asset_in == &self.asset_a {
            self.asset_b.clone()
        } else if asset_in == &self.asset_b {
            self.asset_a.clone()
        } else {
            return Err(PoolError::UnknownPair(asset_in.clone(), asset_in.clone()));
        };
        let straight = asset_in == &self.asset_a;
        let (reserve_in, reserve_out) = self.ordered_reserves(straight);
        if reserve_in == 0 || reserve_out == 0 {
            return Err(PoolError::InsufficientLiquidity);
        }

        let fee_keep = BPS_DENOMINATOR.saturating_sub(self.swap_fee_bps as u64) as u128;
        let in_with_fee = amount_in as u128 * fee_keep;
        let numerator = in_with_fee * reserve_out as u128;
        let denominator = reserve_in as u128 * BPS_DENOMINATOR as u128 + in_with_fee;
        let amount_out =
            u64::try_from(numerator / denominator).map_err(|_| MathError::Overflow)?;
        if amount_out == 0 {
            return Err(PoolError::InsufficientLiquidity);
        }
        if amount_out < min_out {
            return Err(PoolError::Slippage {
                asset: asset_out,
                minimum: min_out,
                actual: amount_out,
            });
        }

        self.ledger
            .transfer(asset_in, trader, &self.address, amount_in)?;
        self.ledger
            .transfer(&asset_out, &self.address, trader, amount_out)?;
        self.touch();

        tracing::debug!(
            pool = %self.address,
            asset_in = %asset_in,
            amount_in,
            amount_out,
            "swap executed"
        );
        Ok(amount_out)
    }

    /// `true` when `(a, b)` is in slot order, `false` when reversed.
    fn orientation(&self, a: &AssetId, b: &AssetId) -> Result<bool, PoolError> {
        if a == &self.asset_a && b == &self.asset_b {
            Ok(true)
        } else if a == &self.asset_b && b == &self.asset_a {
            Ok(false)
        } else {
            Err(PoolError::UnknownPair(a.clone(), b.clone()))
        }
    }

    fn ordered_reserves(&self, straight: bool) -> (Amount, Amount) {
        let r = self.reserves();
        if straight {
            (r.reserve_a, r.reserve_b)
        } else {
            (r.reserve_b, r.reserve_a)
        }
    }

    fn check_deadline(&self, deadline: DateTime<Utc>) -> Result<(), PoolError> {
        let now = self.clock.now();
        if now > deadline {
            return Err(PoolError::Expired { deadline, now });
        }
        Ok(())
    }

    fn touch(&self) {
        *self.updated_at.write() = self.clock.now();
    }

    /// Deadline helper for callers that want the pool's notion of "soon".
    pub fn deadline_in(&self, seconds: i64) -> DateTime<Utc> {
        self.clock.now() + Duration::seconds(seconds)
    }
}

fn quote_amount(amount: Amount, reserve_in: Amount, reserve_out: Amount) -> Result<Amount, PoolError> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(PoolError::InsufficientLiquidity);
    }
    Ok(mul_div_floor(amount, reserve_out, reserve_in)?)
}

fn ensure_min(asset: &AssetId, minimum: Amount, actual: Amount) -> Result<(), PoolError> {
    if actual < minimum {
        return Err(PoolError::Slippage {
            asset: asset.clone(),
            minimum,
            actual,
        });
    }
    Ok(())
}

impl PoolPair for ConstantProductPool {
    fn asset_a(&self) -> &AssetId {
        &self.asset_a
    }

    fn asset_b(&self) -> &AssetId {
        &self.asset_b
    }

    fn position_asset(&self) -> &AssetId {
        &self.position_asset
    }

    fn reserves(&self) -> Reserves {
        Reserves {
            reserve_a: self.ledger.balance_of(&self.asset_a, &self.address),
            reserve_b: self.ledger.balance_of(&self.asset_b, &self.address),
            updated_at: *self.updated_at.read(),
        }
    }

    fn total_supply(&self) -> Amount {
        self.ledger.total_supply(&self.position_asset)
    }
}

impl PoolRouter for ConstantProductPool {
    fn address(&self) -> &Address {
        &self.address
    }

    fn quote(&self, amount_in: Amount, path: &[AssetId]) -> Result<Amount, PoolError> {
        if path.len() != 2 {
            return Err(PoolError::InvalidPath(path.len()));
        }
        let straight = self.orientation(&path[0], &path[1])?;
        let (reserve_in, reserve_out) = self.ordered_reserves(straight);
        quote_amount(amount_in, reserve_in, reserve_out)
    }

    fn add_liquidity(
        &self,
        request: &AddLiquidityRequest,
    ) -> Result<AddLiquidityOutcome, PoolError> {
        self.check_deadline(request.deadline)?;
        let straight = self.orientation(&request.asset_a, &request.asset_b)?;
        let (reserve_a, reserve_b) = self.ordered_reserves(straight);

        let (amount_a, amount_b) = if reserve_a == 0 && reserve_b == 0 {
            (request.amount_a_desired, request.amount_b_desired)
        } else {
            let b_optimal = quote_amount(request.amount_a_desired, reserve_a, reserve_b)?;
            if b_optimal <= request.amount_b_desired {
                ensure_min(&request.asset_b, request.amount_b_min, b_optimal)?;
                (request.amount_a_desired, b_optimal)
            } else {
                let a_optimal = quote_amount(request.amount_b_desired, reserve_b, reserve_a)?;
                ensure_min(&request.asset_a, request.amount_a_min, a_optimal)?;
                (a_optimal, request.amount_b_desired)
            }
        };
        ensure_min(&request.asset_a, request.amount_a_min, amount_a)?;
        ensure_min(&request.asset_b, request.amount_b_min, amount_b)?;

        let supply = self.total_supply();
        let units = if supply == 0 {
            u64::try_from(isqrt(amount_a as u128 * amount_b as u128))
                .map_err(|_| MathError::Overflow)?
        } else {
            let by_a = mul_div_floor(amount_a, supply, reserve_a)?;
            let by_b = mul_div_floor(amount_b, supply, reserve_b)?;
            by_a.min(by_b)
        };
        if units == 0 {
            return Err(PoolError::InsufficientLiquidityMinted);
        }

        self.ledger.transfer_from(
            &request.asset_a,
            &self.address,
            &request.provider,
            &self.address,
            amount_a,
        )?;
        self.ledger.transfer_from(
            &request.asset_b,
            &self.address,
            &request.provider,
            &self.address,
            amount_b,
        )?;
        self.ledger
            .mint(&self.position_asset, &self.address, &request.recipient, units)?;
        self.touch();

        tracing::debug!(
            pool = %self.address,
            amount_a,
            amount_b,
            units,
            "liquidity added"
        );
        Ok(AddLiquidityOutcome {
            amount_a,
            amount_b,
            units,
        })
    }

    fn remove_liquidity(
        &self,
        request: &RemoveLiquidityRequest,
    ) -> Result<RemoveLiquidityOutcome, PoolError> {
        self.check_deadline(request.deadline)?;
        let straight = self.orientation(&request.asset_a, &request.asset_b)?;
        let (reserve_a, reserve_b) = self.ordered_reserves(straight);
        let supply = self.total_supply();
        if supply == 0 {
            return Err(PoolError::InsufficientLiquidity);
        }

        let amount_a = mul_div_floor(request.units, reserve_a, supply)?;
        let amount_b = mul_div_floor(request.units, reserve_b, supply)?;
        if amount_a == 0 || amount_b == 0 {
            return Err(PoolError::InsufficientLiquidityBurned);
        }
        ensure_min(&request.asset_a, request.amount_a_min, amount_a)?;
        ensure_min(&request.asset_b, request.amount_b_min, amount_b)?;

        self.ledger.transfer_from(
            &self.position_asset,
            &self.address,
            &request.provider,
            &self.address,
            request.units,
        )?;
        self.ledger
            .burn(&self.position_asset, &self.address, &self.address, request.units)?;
        self.ledger
            .transfer(&request.asset_a, &self.address, &request.recipient, amount_a)?;
        self.ledger
            .transfer(&request.asset_b, &self.address, &request.recipient, amount_b)?;
        self.touch();

        tracing::debug!(
            pool = %self.address,
            units = request.units,
            amount_a,
            amount_b,
            "liquidity removed"
        );
        Ok(RemoveLiquidityOutcome { amount_a, amount_b })
    }
}
