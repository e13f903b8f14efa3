//! # Liquidity Pool Interfaces
//!
//! The vault never talks to a concrete AMM. It holds two capabilities:
//!
//! - [`PoolRouter`] -- quote, add liquidity, remove liquidity.
//! - [`PoolPair`] -- read-only introspection of the two-asset pair
//!   (reserves, total position supply, which asset sits in which slot).
//!
//! ```text
//! mod.rs              : contracts, request/outcome types, errors
//! constant_product.rs : ConstantProductPool: an x*y=k pair + router
//! ```
//!
//! Pairs are unordered from the caller's point of view: a request names its
//! assets explicitly and the pool maps them onto its own slots.

pub mod constant_product;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::math::MathError;
use crate::types::{Address, Amount, AssetId};

pub use constant_product::ConstantProductPool;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by pool and router operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The request's deadline passed before execution.
    #[error("deadline expired: {deadline} is before {now}")]
    Expired {
        /// The requested deadline.
        deadline: DateTime<Utc>,
        /// When execution was attempted.
        now: DateTime<Utc>,
    },

    /// The pair does not trade these assets.
    #[error("pair does not trade {0}/{1}")]
    UnknownPair(AssetId, AssetId),

    /// A quote path must name exactly two distinct assets.
    #[error("invalid quote path of length {0}")]
    InvalidPath(usize),

    /// An output would fall below the caller's minimum.
    #[error("insufficient {asset} amount: minimum {minimum}, would receive {actual}")]
    Slippage {
        /// The asset whose floor was violated.
        asset: AssetId,
        /// Caller-supplied floor.
        minimum: Amount,
        /// What the pool could deliver.
        actual: Amount,
    },

    /// The pair has no reserves to price against.
    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    /// An add would mint zero position units.
    #[error("insufficient liquidity minted")]
    InsufficientLiquidityMinted,

    /// A remove would return zero of either asset.
    #[error("insufficient liquidity burned")]
    InsufficientLiquidityBurned,

    /// Fixed-point failure inside the pool math.
    #[error("pool math: {0}")]
    Math(#[from] MathError),

    /// The underlying ledger refused a transfer.
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Pair reserves in slot order, plus the time of the last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    /// Reserve of [`PoolPair::asset_a`].
    pub reserve_a: Amount,
    /// Reserve of [`PoolPair::asset_b`].
    pub reserve_b: Amount,
    /// Last time the reserves changed.
    pub updated_at: DateTime<Utc>,
}

/// Arguments to [`PoolRouter::add_liquidity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityRequest {
    /// First asset of the deposit.
    pub asset_a: AssetId,
    /// Second asset of the deposit.
    pub asset_b: AssetId,
    /// Most of `asset_a` the caller is willing to deposit.
    pub amount_a_desired: Amount,
    /// Most of `asset_b` the caller is willing to deposit.
    pub amount_b_desired: Amount,
    /// Least of `asset_a` that must be deposited.
    pub amount_a_min: Amount,
    /// Least of `asset_b` that must be deposited.
    pub amount_b_min: Amount,
    /// Account paying both assets. Must have approved the router.
    pub provider: Address,
    /// Account receiving the position units.
    pub recipient: Address,
    /// Latest acceptable execution time.
    pub deadline: DateTime<Utc>,
}

/// Result of a successful add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityOutcome {
    /// `asset_a` actually deposited.
    pub amount_a: Amount,
    /// `asset_b` actually deposited.
    pub amount_b: Amount,
    /// Position units minted to the recipient.
    pub units: Amount,
}

/// Arguments to [`PoolRouter::remove_liquidity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityRequest {
    /// First asset to receive.
    pub asset_a: AssetId,
    /// Second asset to receive.
    pub asset_b: AssetId,
    /// Position units to redeem.
    pub units: Amount,
    /// Least of `asset_a` that must come back.
    pub amount_a_min: Amount,
    /// Least of `asset_b` that must come back.
    pub amount_b_min: Amount,
    /// Account surrendering the units. Must have approved the router.
    pub provider: Address,
    /// Account receiving both assets.
    pub recipient: Address,
    /// Latest acceptable execution time.
    pub deadline: DateTime<Utc>,
}

/// Result of a successful remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityOutcome {
    /// `asset_a` returned.
    pub amount_a: Amount,
    /// `asset_b` returned.
    pub amount_b: Amount,
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Read-only view of a two-asset pool.
pub trait PoolPair: Send + Sync {
    /// Asset in slot A.
    fn asset_a(&self) -> &AssetId;

    /// Asset in slot B.
    fn asset_b(&self) -> &AssetId;

    /// The ledger asset representing pool-position units.
    fn position_asset(&self) -> &AssetId;

    /// Current reserves in slot order.
    fn reserves(&self) -> Reserves;

    /// Total position units in existence.
    fn total_supply(&self) -> Amount;
}

/// The state-changing side of the pool.
pub trait PoolRouter: Send + Sync {
    /// The account that pulls funds via `transfer_from`. Callers approve
    /// this address before adding or removing liquidity.
    fn address(&self) -> &Address;

    /// Amount of `path[1]` equivalent to `amount_in` of `path[0]` at the
    /// current reserve ratio. No state change.
    fn quote(&self, amount_in: Amount, path: &[AssetId]) -> Result<Amount, PoolError>;

    /// Deposits both assets and mints position units.
    fn add_liquidity(&self, request: &AddLiquidityRequest)
        -> Result<AddLiquidityOutcome, PoolError>;

    /// Burns position units and returns both assets.
    fn remove_liquidity(
        &self,
        request: &RemoveLiquidityRequest,
    ) -> Result<RemoveLiquidityOutcome, PoolError>;
}
