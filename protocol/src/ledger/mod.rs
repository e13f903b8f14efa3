//! # Asset Ledger
//!
//! The fungible-asset ledger the vault settles against. Base asset, quote
//! asset, share tokens and pool-position tokens all live here.
//!
//! ```text
//! mod.rs    : the AssetLedger contract, asset metadata, errors
//! memory.rs : InMemoryLedger: a journaled, rollback-capable implementation
//! ```
//!
//! Every call names its acting party explicitly. There is no ambient
//! "message sender" -- a vault transferring out of its own account passes
//! its own address as `from`.

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, Amount, AssetId};

pub use memory::InMemoryLedger;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The asset has never been registered.
    #[error("unknown asset: {0}")]
    UnknownAsset(AssetId),

    /// An asset with this id is already registered.
    #[error("asset already registered: {0}")]
    AssetExists(AssetId),

    /// The account does not hold enough of the asset.
    #[error("insufficient {asset} balance for {who}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Asset being moved.
        asset: AssetId,
        /// Account being debited.
        who: Address,
        /// Current balance.
        available: Amount,
        /// Amount requested.
        requested: Amount,
    },

    /// The spender's allowance is too small.
    #[error("insufficient {asset} allowance: {owner} granted {spender} {allowance}, requested {requested}")]
    InsufficientAllowance {
        /// Asset being moved.
        asset: AssetId,
        /// Account whose funds are being moved.
        owner: Address,
        /// Account moving them.
        spender: Address,
        /// Remaining allowance.
        allowance: Amount,
        /// Amount requested.
        requested: Amount,
    },

    /// Only the registered minter may mint or burn this asset.
    #[error("{caller} is not the minter of {asset}")]
    UnauthorizedMinter {
        /// The asset.
        asset: AssetId,
        /// Who tried.
        caller: Address,
    },

    /// A balance or supply would exceed `u64::MAX`.
    #[error("{asset} supply overflow")]
    Overflow {
        /// The asset.
        asset: AssetId,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Display metadata for a registered asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Unique asset id.
    pub asset_id: AssetId,
    /// Human-readable name (e.g., "USD Coin").
    pub name: String,
    /// Ticker symbol (e.g., "USDC").
    pub symbol: String,
    /// Display decimals. The ledger itself never divides.
    pub decimals: u8,
}

impl AssetInfo {
    /// Convenience constructor.
    pub fn new(asset_id: AssetId, name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            asset_id,
            name: name.into(),
            symbol: symbol.into(),
            decimals,
        }
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A multi-asset fungible ledger.
pub trait AssetLedger: Send + Sync {
    /// Registers a new asset with `minter` as the only account allowed to
    /// mint and burn it.
    fn register_asset(&self, info: AssetInfo, minter: Address) -> Result<(), LedgerError>;

    /// Metadata for a registered asset.
    fn asset_info(&self, asset: &AssetId) -> Option<AssetInfo>;

    /// Balance of `who`, zero for unknown accounts or assets.
    fn balance_of(&self, asset: &AssetId, who: &Address) -> Amount;

    /// Total issued units of `asset`.
    fn total_supply(&self, asset: &AssetId) -> Amount;

    /// Remaining amount `spender` may move out of `owner`'s account.
    fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> Amount;

    /// Moves `amount` from `from` to `to`. `from` is the acting party.
    fn transfer(
        &self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Sets (overwrites) the allowance `owner` grants `spender`.
    fn approve(
        &self,
        asset: &AssetId,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`,
    /// consuming allowance.
    fn transfer_from(
        &self,
        asset: &AssetId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Creates `amount` new units for `to`. Minter-only.
    fn mint(
        &self,
        asset: &AssetId,
        minter: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Destroys `amount` units held by `from`. Minter-only.
    fn burn(
        &self,
        asset: &AssetId,
        minter: &Address,
        from: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;
}
