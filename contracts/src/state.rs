//! # Vault State
//!
//! The books of a single vault. Immutable identity lives in
//! [`VaultMetadata`]; everything an operation may change lives in
//! [`VaultState`], which the controller clones into a working copy for
//! each unit of work.

use chrono::{DateTime, Utc};
use pulse_protocol::config::{
    MAX_REBALANCE_THRESHOLD_BPS, MAX_SLIPPAGE_BPS, MAX_TARGET_ALLOCATION_BPS,
    MAX_TREASURY_FEE_BPS,
};
use pulse_protocol::types::{Address, Amount, AssetId, Bps};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Where a vault is in its life.
///
/// `Expired` is reached by time, `Deactivated` by the owner; both are
/// one-way and independent. When both apply, `Deactivated` is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultStatus {
    /// Accepting deposits.
    Active,
    /// Past its expiry; withdrawals only.
    Expired,
    /// Switched off by the owner; withdrawals only.
    Deactivated,
}

impl std::fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VaultStatus::Active => write!(f, "Active"),
            VaultStatus::Expired => write!(f, "Expired"),
            VaultStatus::Deactivated => write!(f, "Deactivated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Identity of a vault, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    /// Unique id assigned by the factory.
    pub vault_id: Uuid,
    /// The vault's own ledger account.
    pub address: Address,
    /// External event this vault tracks.
    pub event_id: u64,
    /// Human-readable name, also used for the share token.
    pub name: String,
    /// Share token symbol.
    pub symbol: String,
    /// Who may call owner-only operations.
    pub owner: Address,
    /// Where withdrawal fees go.
    pub treasury: Address,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The tunable knobs of a vault. Bounds are checked by [`validate`](Self::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Share of total assets to hold in the pool.
    pub target_allocation_bps: Bps,
    /// Slippage tolerance for pool operations.
    pub max_slippage_bps: Bps,
    /// Fee deducted from every withdrawal. Fixed at creation.
    pub treasury_fee_bps: Bps,
    /// Drift band around the target inside which rebalancing does nothing.
    pub rebalance_threshold_bps: Bps,
}

impl VaultConfig {
    /// Checks every field against its bound.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ConfigurationError`] naming the first field
    /// out of range.
    pub fn validate(&self) -> Result<(), VaultError> {
        check_bound(
            "target_allocation_bps",
            self.target_allocation_bps,
            MAX_TARGET_ALLOCATION_BPS,
        )?;
        check_bound("max_slippage_bps", self.max_slippage_bps, MAX_SLIPPAGE_BPS)?;
        check_bound("treasury_fee_bps", self.treasury_fee_bps, MAX_TREASURY_FEE_BPS)?;
        check_bound(
            "rebalance_threshold_bps",
            self.rebalance_threshold_bps,
            MAX_REBALANCE_THRESHOLD_BPS,
        )
    }
}

pub(crate) fn check_bound(field: &str, value: Bps, max: Bps) -> Result<(), VaultError> {
    if value > max {
        return Err(VaultError::ConfigurationError(format!(
            "{} = {} exceeds maximum {}",
            field, value, max
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// VaultState
// ---------------------------------------------------------------------------

/// The mutable books of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    /// Asset users deposit and withdraw.
    pub base_asset: AssetId,
    /// The other side of the pool pair.
    pub quote_asset: AssetId,
    /// The vault's share token.
    pub share_asset: AssetId,
    /// The pool's position token.
    pub position_asset: AssetId,
    /// Outstanding shares. Moves only with mint and burn.
    pub share_supply: Amount,
    /// Base asset held directly.
    pub idle_balance: Amount,
    /// Pool-position units held.
    pub pool_position_units: Amount,
    /// Quote asset held for pairing on adds. Not part of total assets.
    pub quote_balance: Amount,
    /// Current configuration.
    pub config: VaultConfig,
    /// `false` once the owner deactivates.
    pub is_active: bool,
    /// Deposits close at this instant.
    pub expires_at: DateTime<Utc>,
}

impl VaultState {
    /// Lifecycle status at `now`.
    pub fn status(&self, now: DateTime<Utc>) -> VaultStatus {
        if !self.is_active {
            VaultStatus::Deactivated
        } else if now >= self.expires_at {
            VaultStatus::Expired
        } else {
            VaultStatus::Active
        }
    }

    /// Fails unless deposits are open at `now`. Deactivation is reported
    /// ahead of expiry.
    pub fn ensure_accepting_deposits(&self, now: DateTime<Utc>) -> Result<(), VaultError> {
        match self.status(now) {
            VaultStatus::Active => Ok(()),
            VaultStatus::Expired => Err(VaultError::VaultExpired),
            VaultStatus::Deactivated => Err(VaultError::VaultInactive),
        }
    }
}
