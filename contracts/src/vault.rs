//! # Vault Controller
//!
//! Orchestrates one vault: deposits, withdrawals, yield, owner
//! configuration and lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//!   Active ──(now >= expires_at)──▶ Expired
//!     │
//!     └──(owner: deactivate)──────▶ Deactivated
//! ```
//!
//! Both transitions are one-way. Deposits need `Active`; withdrawals work
//! in every state.
//!
//! ## Units of work
//!
//! Every mutating operation runs as one unit of work:
//!
//! 1. Clone [`VaultState`] into a working copy and open a host transaction.
//! 2. Run all checks and external calls against the working copy.
//! 3. On success commit the host transaction, swap the working copy in and
//!    publish the buffered events. On failure roll the host back and drop
//!    the working copy together with its events.
//!
//! A failed operation therefore leaves no trace in the vault, the ledger or
//! the pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pulse_protocol::clock::Clock;
use pulse_protocol::config::{
    MAX_REBALANCE_THRESHOLD_BPS, MAX_SLIPPAGE_BPS, MAX_TARGET_ALLOCATION_BPS, SHARE_PRICE_SCALE,
};
use pulse_protocol::host::Transactional;
use pulse_protocol::ledger::AssetLedger;
use pulse_protocol::math::mul_div_floor;
use pulse_protocol::pool::{PoolPair, PoolRouter};
use pulse_protocol::types::{Address, Amount, Bps};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapter::PoolAdapter;
use crate::error::VaultError;
use crate::events::{EventRecord, VaultEvent};
use crate::rebalance::{RebalanceAction, RebalancingPolicy};
use crate::shares::{apply_fee, shares_for_deposit, tokens_for_withdraw, FeeSplit};
use crate::state::{check_bound, VaultConfig, VaultMetadata, VaultState, VaultStatus};
use crate::valuation::{AssetValuator, ValuationSnapshot};
use crate::yield_policy::{FixedRateYield, YieldPolicy};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The external systems a vault talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Balances, allowances, mint and burn for every asset.
    pub ledger: Arc<dyn AssetLedger>,
    /// State-changing pool calls.
    pub router: Arc<dyn PoolRouter>,
    /// Read-only pool introspection.
    pub pair: Arc<dyn PoolPair>,
    /// Rolls ledger and pool effects back when an operation fails.
    pub host: Arc<dyn Transactional>,
    /// Source of `now` for expiry and deadlines.
    pub clock: Arc<dyn Clock>,
}

/// Result of a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    /// Shares burned.
    pub shares: Amount,
    /// Base asset the shares were worth.
    pub gross: Amount,
    /// Delivered to the caller.
    pub net: Amount,
    /// Delivered to the treasury.
    pub fee: Amount,
}

/// Working copy of an in-flight operation.
struct Work {
    state: VaultState,
    events: Vec<VaultEvent>,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A pooled-liquidity vault.
pub struct Vault {
    metadata: VaultMetadata,
    state: VaultState,
    ledger: Arc<dyn AssetLedger>,
    host: Arc<dyn Transactional>,
    clock: Arc<dyn Clock>,
    valuator: AssetValuator,
    adapter: PoolAdapter,
    yield_policy: Box<dyn YieldPolicy>,
    events: Vec<EventRecord>,
    next_sequence: u64,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("metadata", &self.metadata)
            .field("state", &self.state)
            .field("events", &self.events.len())
            .finish()
    }
}

impl Vault {
    /// Wires a vault to its collaborators. The share asset must already be
    /// registered on the ledger with the vault's address as minter.
    ///
    /// # Errors
    ///
    /// [`VaultError::ConfigurationError`] if the configuration is out of
    /// bounds or the pool does not trade exactly the base and quote assets.
    pub fn new(
        metadata: VaultMetadata,
        state: VaultState,
        collaborators: Collaborators,
    ) -> Result<Self, VaultError> {
        state.config.validate()?;
        check_pair(&state, collaborators.pair.as_ref())?;

        let valuator = AssetValuator::new(
            Arc::clone(&collaborators.pair),
            state.base_asset.clone(),
            state.quote_asset.clone(),
        );
        let adapter = PoolAdapter::new(
            Arc::clone(&collaborators.router),
            Arc::clone(&collaborators.ledger),
            Arc::clone(&collaborators.clock),
            metadata.address.clone(),
            state.base_asset.clone(),
            state.quote_asset.clone(),
            state.position_asset.clone(),
        );

        let mut vault = Self {
            metadata,
            state,
            ledger: collaborators.ledger,
            host: collaborators.host,
            clock: collaborators.clock,
            valuator,
            adapter,
            yield_policy: Box::new(FixedRateYield::default()),
            events: Vec::new(),
            next_sequence: 0,
        };
        vault.record(vec![VaultEvent::VaultCreated {
            vault: vault.metadata.address.clone(),
            share_asset: vault.state.share_asset.clone(),
            base_asset: vault.state.base_asset.clone(),
            event_id: vault.metadata.event_id,
        }]);
        Ok(vault)
    }

    /// Replaces the yield policy.
    pub fn with_yield_policy(mut self, policy: Box<dyn YieldPolicy>) -> Self {
        self.yield_policy = policy;
        self
    }

    // -----------------------------------------------------------------------
    // User operations
    // -----------------------------------------------------------------------

    /// Deposits `amount` of base asset and mints shares to `caller`.
    ///
    /// The caller must have approved the vault's address for `amount` on
    /// the base asset. The vault rebalances after booking the deposit.
    pub fn deposit(&mut self, caller: &Address, amount: Amount) -> Result<Amount, VaultError> {
        self.unit_of_work("deposit", |vault, work| {
            work.state.ensure_accepting_deposits(vault.clock.now())?;
            if amount == 0 {
                return Err(VaultError::InvalidAmount("deposit amount must be positive".into()));
            }
            let total_before = vault.valuator.total_assets(&work.state)?;
            let shares = shares_for_deposit(amount, total_before, work.state.share_supply)?;

            let address = &vault.metadata.address;
            vault
                .ledger
                .transfer_from(&work.state.base_asset, address, caller, address, amount)?;
            vault
                .ledger
                .mint(&work.state.share_asset, address, caller, shares)?;
            work.state.idle_balance = checked_add(work.state.idle_balance, amount)?;
            work.state.share_supply = checked_add(work.state.share_supply, shares)?;

            vault
                .rebalancer()
                .rebalance(&mut work.state, &mut work.events)?;
            work.events.push(VaultEvent::Deposit {
                caller: caller.clone(),
                amount,
                shares,
            });
            Ok(shares)
        })
    }

    /// Burns `shares` from `caller` and pays out their value, less the
    /// treasury fee. Pulls from the pool when idle base is short.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        shares: Amount,
    ) -> Result<WithdrawReceipt, VaultError> {
        self.unit_of_work("withdraw", |vault, work| {
            if shares == 0 {
                return Err(VaultError::InvalidAmount("shares must be positive".into()));
            }
            let held = vault.ledger.balance_of(&work.state.share_asset, caller);
            if held < shares {
                return Err(VaultError::InsufficientBalance {
                    needed: shares,
                    available: held,
                });
            }
            let total = vault.valuator.total_assets(&work.state)?;
            let gross = tokens_for_withdraw(shares, total, work.state.share_supply)?;
            let FeeSplit { net, fee } = apply_fee(gross, work.state.config.treasury_fee_bps)?;

            vault
                .rebalancer()
                .ensure_idle_liquidity(&mut work.state, gross, &mut work.events)?;

            let address = &vault.metadata.address;
            let base = &work.state.base_asset;
            vault
                .ledger
                .burn(&work.state.share_asset, address, caller, shares)?;
            if net > 0 {
                vault.ledger.transfer(base, address, caller, net)?;
            }
            if fee > 0 {
                vault
                    .ledger
                    .transfer(base, address, &vault.metadata.treasury, fee)?;
            }
            work.state.idle_balance = checked_sub(work.state.idle_balance, gross)?;
            work.state.share_supply = checked_sub(work.state.share_supply, shares)?;

            work.events.push(VaultEvent::Withdraw {
                caller: caller.clone(),
                shares,
                net_amount: net,
                fee,
            });
            Ok(WithdrawReceipt {
                shares,
                gross,
                net,
                fee,
            })
        })
    }

    // -----------------------------------------------------------------------
    // Owner operations
    // -----------------------------------------------------------------------

    /// Reinvests the yield policy's amount, clamped to idle, into the pool.
    /// Returns the base asset actually reinvested.
    pub fn distribute_yield(&mut self, caller: &Address) -> Result<Amount, VaultError> {
        self.unit_of_work("distribute_yield", |vault, work| {
            vault.require_owner(caller)?;
            let valuation = vault.valuator.valuation(&work.state)?;
            let amount = vault
                .yield_policy
                .yield_amount(&valuation)
                .min(work.state.idle_balance);
            let reinvested = if amount > 0 {
                vault
                    .rebalancer()
                    .add_paired(&mut work.state, amount, &mut work.events)?
                    .map_or(0, |receipt| receipt.base_used)
            } else {
                0
            };
            work.events.push(VaultEvent::YieldDistributed { amount: reinvested });
            Ok(reinvested)
        })
    }

    /// Rebalances on demand.
    pub fn rebalance(&mut self, caller: &Address) -> Result<RebalanceAction, VaultError> {
        self.unit_of_work("rebalance", |vault, work| {
            vault.require_owner(caller)?;
            vault
                .rebalancer()
                .rebalance(&mut work.state, &mut work.events)
        })
    }

    /// Closes the vault to deposits for good.
    ///
    /// # Errors
    ///
    /// [`VaultError::VaultInactive`] if already deactivated.
    pub fn deactivate(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.unit_of_work("deactivate", |vault, work| {
            vault.require_owner(caller)?;
            if !work.state.is_active {
                return Err(VaultError::VaultInactive);
            }
            work.state.is_active = false;
            work.events.push(VaultEvent::Deactivated {
                caller: caller.clone(),
            });
            Ok(())
        })
    }

    /// Sets the pool allocation target.
    pub fn set_target_allocation(&mut self, caller: &Address, bps: Bps) -> Result<(), VaultError> {
        self.update_config(caller, "target_allocation_bps", bps, MAX_TARGET_ALLOCATION_BPS, |c| {
            &mut c.target_allocation_bps
        })
    }

    /// Sets the slippage tolerance for pool operations.
    pub fn set_max_slippage(&mut self, caller: &Address, bps: Bps) -> Result<(), VaultError> {
        self.update_config(caller, "max_slippage_bps", bps, MAX_SLIPPAGE_BPS, |c| {
            &mut c.max_slippage_bps
        })
    }

    /// Sets the drift band inside which rebalancing holds.
    pub fn set_rebalance_threshold(&mut self, caller: &Address, bps: Bps) -> Result<(), VaultError> {
        self.update_config(
            caller,
            "rebalance_threshold_bps",
            bps,
            MAX_REBALANCE_THRESHOLD_BPS,
            |c| &mut c.rebalance_threshold_bps,
        )
    }

    fn update_config(
        &mut self,
        caller: &Address,
        field: &'static str,
        value: Bps,
        max: Bps,
        slot: fn(&mut VaultConfig) -> &mut Bps,
    ) -> Result<(), VaultError> {
        self.unit_of_work("update_config", |vault, work| {
            vault.require_owner(caller)?;
            check_bound(field, value, max)?;
            let old = std::mem::replace(slot(&mut work.state.config), value);
            work.events.push(VaultEvent::ConfigUpdated {
                field: field.to_string(),
                old,
                new: value,
            });
            Ok(())
        })
    }

    /// Moves `amount` of quote asset from the owner into the vault's
    /// pairing inventory. The owner must have approved the vault.
    pub fn provision_quote(&mut self, caller: &Address, amount: Amount) -> Result<(), VaultError> {
        self.unit_of_work("provision_quote", |vault, work| {
            vault.require_owner(caller)?;
            if amount == 0 {
                return Err(VaultError::InvalidAmount("quote amount must be positive".into()));
            }
            let address = &vault.metadata.address;
            vault
                .ledger
                .transfer_from(&work.state.quote_asset, address, caller, address, amount)?;
            work.state.quote_balance = checked_add(work.state.quote_balance, amount)?;
            work.events.push(VaultEvent::QuoteProvisioned {
                caller: caller.clone(),
                amount,
            });
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Identity of this vault.
    pub fn metadata(&self) -> &VaultMetadata {
        &self.metadata
    }

    /// Factory-assigned id.
    pub fn id(&self) -> Uuid {
        self.metadata.vault_id
    }

    /// The vault's ledger account.
    pub fn address(&self) -> &Address {
        &self.metadata.address
    }

    /// Committed state.
    pub fn state(&self) -> &VaultState {
        &self.state
    }

    /// Lifecycle status right now.
    pub fn status(&self) -> VaultStatus {
        self.state.status(self.clock.now())
    }

    /// When deposits close.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.state.expires_at
    }

    pub fn total_assets(&self) -> Result<Amount, VaultError> {
        self.valuator.total_assets(&self.state)
    }

    pub fn valuation(&self) -> Result<ValuationSnapshot, VaultError> {
        self.valuator.valuation(&self.state)
    }

    /// Base asset per share, scaled by [`SHARE_PRICE_SCALE`]. An empty
    /// vault prices at exactly one.
    pub fn share_price(&self) -> Result<Amount, VaultError> {
        if self.state.share_supply == 0 {
            return Ok(SHARE_PRICE_SCALE);
        }
        Ok(mul_div_floor(
            self.total_assets()?,
            SHARE_PRICE_SCALE,
            self.state.share_supply,
        )?)
    }

    /// Shares a deposit of `amount` would mint right now.
    pub fn preview_deposit(&self, amount: Amount) -> Result<Amount, VaultError> {
        shares_for_deposit(amount, self.total_assets()?, self.state.share_supply)
    }

    /// What burning `shares` would pay out right now.
    pub fn preview_withdraw(&self, shares: Amount) -> Result<FeeSplit, VaultError> {
        let gross = tokens_for_withdraw(shares, self.total_assets()?, self.state.share_supply)?;
        apply_fee(gross, self.state.config.treasury_fee_bps)
    }

    /// Every committed event not yet drained.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Takes the committed events, leaving the buffer empty. Sequence
    /// numbers keep counting.
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn rebalancer(&self) -> RebalancingPolicy<'_> {
        RebalancingPolicy::new(&self.valuator, &self.adapter)
    }

    fn require_owner(&self, caller: &Address) -> Result<(), VaultError> {
        if caller != &self.metadata.owner {
            return Err(VaultError::Unauthorized(format!(
                "{} is not the owner of vault {}",
                caller, self.metadata.vault_id
            )));
        }
        Ok(())
    }

    fn unit_of_work<T>(
        &mut self,
        operation: &'static str,
        body: impl FnOnce(&Vault, &mut Work) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let host = Arc::clone(&self.host);
        let tx = host.begin();
        let mut work = Work {
            state: self.state.clone(),
            events: Vec::new(),
        };
        match body(self, &mut work) {
            Ok(value) => {
                tx.commit();
                self.state = work.state;
                self.record(work.events);
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                warn!(
                    vault_id = %self.metadata.vault_id,
                    operation,
                    error = %err,
                    "operation rolled back"
                );
                Err(err)
            }
        }
    }

    fn record(&mut self, events: Vec<VaultEvent>) {
        let at = self.clock.now();
        for event in events {
            let record = EventRecord {
                vault_id: self.metadata.vault_id,
                sequence: self.next_sequence,
                at,
                event,
            };
            self.next_sequence += 1;
            record.emit();
            self.events.push(record);
        }
        info!(
            vault_id = %self.metadata.vault_id,
            idle = self.state.idle_balance,
            units = self.state.pool_position_units,
            shares = self.state.share_supply,
            "vault state committed"
        );
    }
}

fn check_pair(state: &VaultState, pair: &dyn PoolPair) -> Result<(), VaultError> {
    let (a, b) = (pair.asset_a(), pair.asset_b());
    let (base, quote) = (&state.base_asset, &state.quote_asset);
    let matches = (a == base && b == quote) || (a == quote && b == base);
    if base == quote || !matches {
        return Err(VaultError::ConfigurationError(format!(
            "pool trades {}/{}, vault needs {}/{}",
            a, b, base, quote
        )));
    }
    if pair.position_asset() != &state.position_asset {
        return Err(VaultError::ConfigurationError(format!(
            "pool position asset is {}, vault expects {}",
            pair.position_asset(),
            state.position_asset
        )));
    }
    Ok(())
}

fn checked_add(a: Amount, b: Amount) -> Result<Amount, VaultError> {
    a.checked_add(b).ok_or(VaultError::ArithmeticOverflow)
}

fn checked_sub(a: Amount, b: Amount) -> Result<Amount, VaultError> {
    a.checked_sub(b).ok_or(VaultError::ArithmeticOverflow)
}
