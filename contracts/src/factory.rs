//! # Vault Factory
//!
//! Creates vaults from a parameter struct and keeps a registry of them.
//!
//! Creation is itself a unit of work: the share token is registered on the
//! ledger inside a host transaction, and if the vault cannot be built the
//! registration is rolled back with it.
//!
//! Vaults are handed out as `Arc<Mutex<Vault>>`. Holding the lock is the
//! single-writer guarantee for that vault; different vaults never contend.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use pulse_protocol::clock::Clock;
use pulse_protocol::config::{
    DEFAULT_MAX_SLIPPAGE_BPS, DEFAULT_REBALANCE_THRESHOLD_BPS, DEFAULT_TARGET_ALLOCATION_BPS,
    DEFAULT_TREASURY_FEE_BPS, DEFAULT_VAULT_LIFETIME_SECS, MAX_TREASURY_FEE_BPS,
};
use pulse_protocol::host::Transactional;
use pulse_protocol::ledger::{AssetInfo, AssetLedger};
use pulse_protocol::pool::{PoolPair, PoolRouter};
use pulse_protocol::types::{Address, AssetId, Bps};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::VaultError;
use crate::state::{check_bound, VaultConfig, VaultMetadata, VaultState};
use crate::vault::{Collaborators, Vault};

/// A vault behind its single-writer lock.
pub type VaultHandle = Arc<Mutex<Vault>>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Deployment-wide settings shared by every vault the factory creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// The only account allowed to create vaults; owner of each vault.
    pub owner: Address,
    /// Receives withdrawal fees.
    pub treasury: Address,
    /// Withdrawal fee for new vaults.
    #[serde(default = "default_treasury_fee")]
    pub treasury_fee_bps: Bps,
    /// The pairing asset every vault's pool trades against.
    pub quote_asset: AssetId,
}

fn default_treasury_fee() -> Bps {
    DEFAULT_TREASURY_FEE_BPS
}

/// Per-vault creation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultParams {
    /// Asset users deposit.
    pub base_asset: AssetId,
    /// External event the vault tracks.
    pub event_id: u64,
    /// Vault and share-token name.
    pub name: String,
    /// Share-token symbol.
    pub symbol: String,
    #[serde(default = "default_target")]
    pub target_allocation_bps: Bps,
    #[serde(default = "default_slippage")]
    pub max_slippage_bps: Bps,
    #[serde(default = "default_threshold")]
    pub rebalance_threshold_bps: Bps,
    /// Seconds from creation until deposits close.
    #[serde(default = "default_lifetime")]
    pub expiry_duration_secs: i64,
}

fn default_target() -> Bps {
    DEFAULT_TARGET_ALLOCATION_BPS
}

fn default_slippage() -> Bps {
    DEFAULT_MAX_SLIPPAGE_BPS
}

fn default_threshold() -> Bps {
    DEFAULT_REBALANCE_THRESHOLD_BPS
}

fn default_lifetime() -> i64 {
    DEFAULT_VAULT_LIFETIME_SECS
}

impl VaultParams {
    /// Parameters with every tunable at its default.
    pub fn new(
        base_asset: AssetId,
        event_id: u64,
        name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            base_asset,
            event_id,
            name: name.into(),
            symbol: symbol.into(),
            target_allocation_bps: DEFAULT_TARGET_ALLOCATION_BPS,
            max_slippage_bps: DEFAULT_MAX_SLIPPAGE_BPS,
            rebalance_threshold_bps: DEFAULT_REBALANCE_THRESHOLD_BPS,
            expiry_duration_secs: DEFAULT_VAULT_LIFETIME_SECS,
        }
    }
}

/// The pool a vault allocates into.
#[derive(Clone)]
pub struct PoolBinding {
    pub router: Arc<dyn PoolRouter>,
    pub pair: Arc<dyn PoolPair>,
}

impl PoolBinding {
    /// Binds a value that is both router and pair, such as
    /// [`ConstantProductPool`](pulse_protocol::pool::ConstantProductPool).
    pub fn from_pool<P>(pool: Arc<P>) -> Self
    where
        P: PoolRouter + PoolPair + 'static,
    {
        Self {
            router: pool.clone(),
            pair: pool,
        }
    }
}

// ---------------------------------------------------------------------------
// VaultFactory
// ---------------------------------------------------------------------------

/// Builds vaults and remembers them.
pub struct VaultFactory {
    config: FactoryConfig,
    ledger: Arc<dyn AssetLedger>,
    host: Arc<dyn Transactional>,
    clock: Arc<dyn Clock>,
    vaults: Vec<VaultHandle>,
    by_id: HashMap<Uuid, usize>,
    by_address: HashMap<Address, usize>,
}

impl VaultFactory {
    /// Creates an empty factory.
    ///
    /// # Errors
    ///
    /// [`VaultError::ConfigurationError`] if the treasury fee is out of
    /// bounds or the quote asset is unknown to the ledger.
    pub fn new(
        config: FactoryConfig,
        ledger: Arc<dyn AssetLedger>,
        host: Arc<dyn Transactional>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, VaultError> {
        check_bound("treasury_fee_bps", config.treasury_fee_bps, MAX_TREASURY_FEE_BPS)?;
        if ledger.asset_info(&config.quote_asset).is_none() {
            return Err(VaultError::ConfigurationError(format!(
                "quote asset {} is not registered",
                config.quote_asset
            )));
        }
        Ok(Self {
            config,
            ledger,
            host,
            clock,
            vaults: Vec::new(),
            by_id: HashMap::new(),
            by_address: HashMap::new(),
        })
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Creates, registers and returns a new vault.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Unauthorized`] unless `caller` is the factory owner.
    /// - [`VaultError::ConfigurationError`] for out-of-range parameters, an
    ///   unknown base asset, or a pool that does not trade exactly
    ///   base/quote.
    pub fn create_vault(
        &mut self,
        caller: &Address,
        params: VaultParams,
        pool: PoolBinding,
    ) -> Result<VaultHandle, VaultError> {
        if caller != &self.config.owner {
            return Err(VaultError::Unauthorized(format!(
                "{} may not create vaults",
                caller
            )));
        }
        let config = VaultConfig {
            target_allocation_bps: params.target_allocation_bps,
            max_slippage_bps: params.max_slippage_bps,
            treasury_fee_bps: self.config.treasury_fee_bps,
            rebalance_threshold_bps: params.rebalance_threshold_bps,
        };
        config.validate()?;
        if params.expiry_duration_secs <= 0 {
            return Err(VaultError::ConfigurationError(format!(
                "expiry_duration_secs must be positive, got {}",
                params.expiry_duration_secs
            )));
        }
        if params.base_asset == self.config.quote_asset {
            return Err(VaultError::ConfigurationError(format!(
                "base asset {} is the quote asset",
                params.base_asset
            )));
        }
        let base_info = self.ledger.asset_info(&params.base_asset).ok_or_else(|| {
            VaultError::ConfigurationError(format!(
                "base asset {} is not registered",
                params.base_asset
            ))
        })?;

        let vault_id = Uuid::new_v4();
        let address = Address::new(format!("vault:{}", vault_id));
        let share_asset = AssetId::new(format!("share:{}", vault_id));
        let now = self.clock.now();
        let expires_at = Duration::try_seconds(params.expiry_duration_secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                VaultError::ConfigurationError(format!(
                    "expiry_duration_secs {} is out of range",
                    params.expiry_duration_secs
                ))
            })?;
        let metadata = VaultMetadata {
            vault_id,
            address: address.clone(),
            event_id: params.event_id,
            name: params.name.clone(),
            symbol: params.symbol.clone(),
            owner: self.config.owner.clone(),
            treasury: self.config.treasury.clone(),
            created_at: now,
        };
        let state = VaultState {
            base_asset: params.base_asset.clone(),
            quote_asset: self.config.quote_asset.clone(),
            share_asset: share_asset.clone(),
            position_asset: pool.pair.position_asset().clone(),
            share_supply: 0,
            idle_balance: 0,
            pool_position_units: 0,
            quote_balance: 0,
            config,
            is_active: true,
            expires_at,
        };
        let collaborators = Collaborators {
            ledger: Arc::clone(&self.ledger),
            router: pool.router,
            pair: pool.pair,
            host: Arc::clone(&self.host),
            clock: Arc::clone(&self.clock),
        };

        let host = Arc::clone(&self.host);
        let tx = host.begin();
        let vault = self
            .ledger
            .register_asset(
                AssetInfo::new(
                    share_asset,
                    params.name.clone(),
                    params.symbol.clone(),
                    base_info.decimals,
                ),
                address.clone(),
            )
            .map_err(VaultError::from)
            .and_then(|()| Vault::new(metadata, state, collaborators));
        let vault = match vault {
            Ok(vault) => {
                tx.commit();
                vault
            }
            Err(err) => {
                tx.rollback();
                return Err(err);
            }
        };

        let handle = Arc::new(Mutex::new(vault));
        self.vaults.push(Arc::clone(&handle));
        let index = self.vaults.len() - 1;
        self.by_id.insert(vault_id, index);
        self.by_address.insert(address.clone(), index);

        info!(
            vault_id = %vault_id,
            vault = %address,
            base = %params.base_asset,
            event_id = params.event_id,
            count = self.vaults.len(),
            "vault created"
        );
        Ok(handle)
    }

    /// Number of vaults created.
    pub fn vault_count(&self) -> usize {
        self.vaults.len()
    }

    /// The `index`-th vault, counting from 1 in creation order.
    pub fn vault(&self, index: usize) -> Option<VaultHandle> {
        index
            .checked_sub(1)
            .and_then(|i| self.vaults.get(i))
            .cloned()
    }

    pub fn vault_by_id(&self, vault_id: &Uuid) -> Option<VaultHandle> {
        self.by_id.get(vault_id).map(|&i| Arc::clone(&self.vaults[i]))
    }

    /// `true` if `address` belongs to a vault this factory created.
    pub fn is_vault(&self, address: &Address) -> bool {
        self.by_address.contains_key(address)
    }

    /// All vaults in creation order.
    pub fn vaults(&self) -> impl Iterator<Item = &VaultHandle> {
        self.vaults.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_fill_defaults_from_json() {
        let params: VaultParams = serde_json::from_str(
            r#"{"base_asset":"EVT","event_id":7,"name":"Final","symbol":"vFIN"}"#,
        )
        .unwrap();
        assert_eq!(params, VaultParams::new("EVT".into(), 7, "Final", "vFIN"));
        assert_eq!(params.target_allocation_bps, DEFAULT_TARGET_ALLOCATION_BPS);
        assert_eq!(params.expiry_duration_secs, DEFAULT_VAULT_LIFETIME_SECS);
    }

    #[test]
    fn factory_config_defaults_fee() {
        let config: FactoryConfig = serde_json::from_str(
            r#"{"owner":"owner","treasury":"treasury","quote_asset":"USDC"}"#,
        )
        .unwrap();
        assert_eq!(config.treasury_fee_bps, DEFAULT_TREASURY_FEE_BPS);
    }
}
