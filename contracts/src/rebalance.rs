//! # Rebalancing Policy
//!
//! Keeps the pool's share of total assets near `target_allocation_bps`:
//!
//! ```text
//! target  = total_assets * target_allocation_bps / 10_000
//! current = value of pool position
//!
//! current < target  ->  add   min(target - current, idle)
//! current > target  ->  remove units worth (current - target)
//! otherwise         ->  hold
//! ```
//!
//! A move no larger than the drift band is skipped. The band is the
//! configured `rebalance_threshold_bps` of total assets, and never less
//! than the value of one pool-position unit, which is the rounding error
//! of the valuation itself. That floor is what makes a second call right
//! after the first a no-op.
//!
//! Adds need quote asset to pair with. The amount added is clamped to what
//! the vault's quote inventory covers at the current ratio; with no
//! inventory the policy holds.
//!
//! Every function here works on the caller's working copy of the state
//! and pushes events into the caller's buffer. Nothing is committed here.

use pulse_protocol::math::{bps_of, mul_div, mul_div_floor, Rounding};
use pulse_protocol::types::Amount;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::{AddLiquidityReceipt, PoolAdapter, RemoveLiquidityReceipt};
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::state::VaultState;
use crate::valuation::{AssetValuator, PoolSnapshot};

/// What a rebalance did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalanceAction {
    /// Within the band, or nothing movable.
    Hold,
    /// Moved value into the pool.
    Added(AddLiquidityReceipt),
    /// Moved value out of the pool.
    Removed {
        /// Units redeemed.
        units: Amount,
        /// What came back.
        receipt: RemoveLiquidityReceipt,
    },
}

/// Allocation decisions for one vault, borrowed from its valuator and
/// adapter for the duration of an operation.
pub struct RebalancingPolicy<'a> {
    valuator: &'a AssetValuator,
    adapter: &'a PoolAdapter,
}

impl<'a> RebalancingPolicy<'a> {
    pub fn new(valuator: &'a AssetValuator, adapter: &'a PoolAdapter) -> Self {
        Self { valuator, adapter }
    }

    /// Moves value into or out of the pool to track the target allocation.
    pub fn rebalance(
        &self,
        state: &mut VaultState,
        events: &mut Vec<VaultEvent>,
    ) -> Result<RebalanceAction, VaultError> {
        let valuation = self.valuator.valuation(state)?;
        let snapshot = self.valuator.pool_snapshot()?;
        let total = valuation.total_assets;
        let target = bps_of(total, state.config.target_allocation_bps)?;
        let current = valuation.pool_value;
        let band = bps_of(total, state.config.rebalance_threshold_bps)?
            .max(unit_value(&snapshot)?);

        debug!(total, target, current, band, "rebalance check");

        if current < target {
            let gap = target - current;
            if gap <= band {
                return Ok(RebalanceAction::Hold);
            }
            let amount = gap.min(state.idle_balance);
            Ok(match self.add_paired(state, amount, events)? {
                Some(receipt) => RebalanceAction::Added(receipt),
                None => RebalanceAction::Hold,
            })
        } else if current > target {
            let excess = current - target;
            if excess <= band {
                return Ok(RebalanceAction::Hold);
            }
            let units = self
                .valuator
                .units_for_value(excess, &snapshot, Rounding::Down)?
                .min(state.pool_position_units);
            if units == 0 {
                return Ok(RebalanceAction::Hold);
            }
            let (expected_base, expected_quote) = proportional(units, &snapshot)?;
            if expected_base == 0 || expected_quote == 0 {
                return Ok(RebalanceAction::Hold);
            }
            let receipt = self.remove_units(state, units, &snapshot, events)?;
            Ok(RebalanceAction::Removed { units, receipt })
        } else {
            Ok(RebalanceAction::Hold)
        }
    }

    /// Makes sure at least `needed` base is idle, pulling from the pool if
    /// not. Units to redeem round up so the shortfall is fully covered.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientBalance`] if idle is still short after
    /// redeeming everything allowed.
    pub fn ensure_idle_liquidity(
        &self,
        state: &mut VaultState,
        needed: Amount,
        events: &mut Vec<VaultEvent>,
    ) -> Result<(), VaultError> {
        if state.idle_balance >= needed {
            return Ok(());
        }
        if state.pool_position_units > 0 {
            let shortfall = needed - state.idle_balance;
            let snapshot = self.valuator.pool_snapshot()?;
            let units = self
                .valuator
                .units_for_value(shortfall, &snapshot, Rounding::Up)?
                .min(state.pool_position_units);
            debug!(needed, shortfall, units, "pulling liquidity for withdrawal");
            self.remove_units(state, units, &snapshot, events)?;
        }
        if state.idle_balance < needed {
            return Err(VaultError::InsufficientBalance {
                needed,
                available: state.idle_balance,
            });
        }
        Ok(())
    }

    /// Adds up to `base_budget` of idle base, paired with quote inventory
    /// at the current ratio. Returns `None` when nothing pairable is left
    /// or the pool would mint nothing.
    pub fn add_paired(
        &self,
        state: &mut VaultState,
        base_budget: Amount,
        events: &mut Vec<VaultEvent>,
    ) -> Result<Option<AddLiquidityReceipt>, VaultError> {
        let snapshot = self.valuator.pool_snapshot()?;
        if snapshot.reserve_base == 0 || snapshot.reserve_quote == 0 {
            debug!("pool has no price yet, holding");
            return Ok(None);
        }
        let mut base = base_budget.min(state.idle_balance);
        if base == 0 {
            return Ok(None);
        }
        let mut quote = self
            .adapter
            .quote(base, &state.base_asset, &state.quote_asset)?;
        if quote > state.quote_balance {
            base = self
                .adapter
                .quote(state.quote_balance, &state.quote_asset, &state.base_asset)?
                .min(base);
            quote = self
                .adapter
                .quote(base, &state.base_asset, &state.quote_asset)?;
        }
        if base == 0 || quote == 0 {
            debug!(base, quote, "nothing pairable, holding");
            return Ok(None);
        }
        if snapshot.total_supply > 0 {
            let by_base = mul_div_floor(base, snapshot.total_supply, snapshot.reserve_base)?;
            let by_quote = mul_div_floor(quote, snapshot.total_supply, snapshot.reserve_quote)?;
            if by_base.min(by_quote) == 0 {
                return Ok(None);
            }
        }

        let receipt = self
            .adapter
            .add_liquidity(base, quote, state.config.max_slippage_bps)?;
        state.idle_balance = state
            .idle_balance
            .checked_sub(receipt.base_used)
            .ok_or(VaultError::ArithmeticOverflow)?;
        state.quote_balance = state
            .quote_balance
            .checked_sub(receipt.quote_used)
            .ok_or(VaultError::ArithmeticOverflow)?;
        state.pool_position_units = state
            .pool_position_units
            .checked_add(receipt.units)
            .ok_or(VaultError::ArithmeticOverflow)?;
        events.push(VaultEvent::LiquidityAdded {
            base_amount: receipt.base_used,
            quote_amount: receipt.quote_used,
            units: receipt.units,
        });
        Ok(Some(receipt))
    }

    fn remove_units(
        &self,
        state: &mut VaultState,
        units: Amount,
        snapshot: &PoolSnapshot,
        events: &mut Vec<VaultEvent>,
    ) -> Result<RemoveLiquidityReceipt, VaultError> {
        let (expected_base, expected_quote) = proportional(units, snapshot)?;
        let receipt = self.adapter.remove_liquidity(
            units,
            expected_base,
            expected_quote,
            state.config.max_slippage_bps,
        )?;
        state.pool_position_units = state
            .pool_position_units
            .checked_sub(units)
            .ok_or(VaultError::ArithmeticOverflow)?;
        state.idle_balance = state
            .idle_balance
            .checked_add(receipt.base_received)
            .ok_or(VaultError::ArithmeticOverflow)?;
        state.quote_balance = state
            .quote_balance
            .checked_add(receipt.quote_received)
            .ok_or(VaultError::ArithmeticOverflow)?;
        events.push(VaultEvent::LiquidityRemoved {
            units,
            base_amount: receipt.base_received,
            quote_amount: receipt.quote_received,
        });
        Ok(receipt)
    }
}

/// Base and quote a pro-rata redemption of `units` should return.
fn proportional(units: Amount, snapshot: &PoolSnapshot) -> Result<(Amount, Amount), VaultError> {
    if snapshot.total_supply == 0 {
        return Err(VaultError::ExternalCallFailed(
            "pool reports zero position supply".into(),
        ));
    }
    Ok((
        mul_div_floor(units, snapshot.reserve_base, snapshot.total_supply)?,
        mul_div_floor(units, snapshot.reserve_quote, snapshot.total_supply)?,
    ))
}

/// Base value of a single position unit, rounded up.
fn unit_value(snapshot: &PoolSnapshot) -> Result<Amount, VaultError> {
    if snapshot.total_supply == 0 {
        return Ok(0);
    }
    Ok(mul_div(1, snapshot.reserve_base, snapshot.total_supply, Rounding::Up)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::VaultConfig;
    use chrono::Utc;
    use pulse_protocol::clock::{Clock, ManualClock};
    use pulse_protocol::ledger::{AssetInfo, AssetLedger, InMemoryLedger};
    use pulse_protocol::pool::{AddLiquidityRequest, ConstantProductPool, PoolPair, PoolRouter};
    use pulse_protocol::types::{Address, AssetId};
    use std::sync::Arc;

    struct Fixture {
        valuator: AssetValuator,
        adapter: PoolAdapter,
        state: VaultState,
    }

    impl Fixture {
        fn policy(&self) -> RebalancingPolicy<'_> {
            RebalancingPolicy::new(&self.valuator, &self.adapter)
        }

        fn run(&mut self) -> (RebalanceAction, Vec<VaultEvent>) {
            let mut events = Vec::new();
            let mut state = self.state.clone();
            let action = self.policy().rebalance(&mut state, &mut events).unwrap();
            self.state = state;
            (action, events)
        }
    }

    /// Pool seeded at 10M EVT / 5M USDC; vault holds `idle` EVT and
    /// `quote` USDC.
    fn fixture(idle: Amount, quote: Amount, target_bps: u16) -> Fixture {
        let evt: AssetId = "EVT".into();
        let usdc: AssetId = "USDC".into();
        let vault: Address = "vault".into();
        let minter: Address = "mint".into();
        let ledger = Arc::new(InMemoryLedger::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        for id in [&evt, &usdc] {
            ledger
                .register_asset(AssetInfo::new(id.clone(), "t", "t", 6), minter.clone())
                .unwrap();
        }
        let pool = Arc::new(
            ConstantProductPool::new(
                ledger.clone(),
                clock.clone(),
                "pool".into(),
                evt.clone(),
                usdc.clone(),
            )
            .unwrap(),
        );
        let seeder: Address = "seeder".into();
        ledger.mint(&evt, &minter, &seeder, 10_000_000).unwrap();
        ledger.mint(&usdc, &minter, &seeder, 5_000_000).unwrap();
        ledger.approve(&evt, &seeder, pool.address(), 10_000_000).unwrap();
        ledger.approve(&usdc, &seeder, pool.address(), 5_000_000).unwrap();
        pool.add_liquidity(&AddLiquidityRequest {
            asset_a: evt.clone(),
            asset_b: usdc.clone(),
            amount_a_desired: 10_000_000,
            amount_b_desired: 5_000_000,
            amount_a_min: 0,
            amount_b_min: 0,
            provider: seeder.clone(),
            recipient: seeder,
            deadline: pool.deadline_in(60),
        })
        .unwrap();
        if idle > 0 {
            ledger.mint(&evt, &minter, &vault, idle).unwrap();
        }
        if quote > 0 {
            ledger.mint(&usdc, &minter, &vault, quote).unwrap();
        }

        let position = pool.position_asset().clone();
        let valuator = AssetValuator::new(pool.clone(), evt.clone(), usdc.clone());
        let adapter = PoolAdapter::new(
            pool,
            ledger,
            clock,
            vault,
            evt.clone(),
            usdc.clone(),
            position.clone(),
        );
        let state = VaultState {
            base_asset: evt,
            quote_asset: usdc,
            share_asset: "share".into(),
            position_asset: position,
            share_supply: idle,
            idle_balance: idle,
            pool_position_units: 0,
            quote_balance: quote,
            config: VaultConfig {
                target_allocation_bps: target_bps,
                max_slippage_bps: 100,
                treasury_fee_bps: 0,
                rebalance_threshold_bps: 0,
            },
            is_active: true,
            expires_at: Utc::now(),
        };
        Fixture {
            valuator,
            adapter,
            state,
        }
    }

    #[test]
    fn moves_target_share_into_pool_then_holds() {
        let mut f = fixture(1_000_000, 1_000_000, 8_000);
        let (action, events) = f.run();
        assert_eq!(
            action,
            RebalanceAction::Added(AddLiquidityReceipt {
                base_used: 800_000,
                quote_used: 400_000,
                units: 565_685,
            })
        );
        assert_eq!(events.len(), 1);
        assert_eq!(f.state.idle_balance, 200_000);
        assert_eq!(f.state.quote_balance, 600_000);
        assert_eq!(f.state.pool_position_units, 565_685);
        assert_eq!(f.valuator.total_assets(&f.state).unwrap(), 999_999);

        let before = f.state.clone();
        let (action, events) = f.run();
        assert_eq!(action, RebalanceAction::Hold);
        assert!(events.is_empty());
        assert_eq!(f.state, before);
    }

    #[test]
    fn over_allocation_is_pulled_back() {
        let mut f = fixture(1_000_000, 1_000_000, 8_000);
        f.run();
        f.state.config.target_allocation_bps = 5_000;

        let (action, _) = f.run();
        assert_eq!(
            action,
            RebalanceAction::Removed {
                units: 212_132,
                receipt: RemoveLiquidityReceipt {
                    base_received: 300_000,
                    quote_received: 150_000,
                },
            }
        );
        assert_eq!(f.state.idle_balance, 500_000);
        assert_eq!(f.state.quote_balance, 750_000);
        assert_eq!(f.valuator.total_assets(&f.state).unwrap(), 999_999);
        assert_eq!(f.run().0, RebalanceAction::Hold);
    }

    #[test]
    fn adds_are_limited_by_quote_inventory() {
        let mut f = fixture(1_000_000, 100_000, 8_000);
        let (action, _) = f.run();
        assert_eq!(
            action,
            RebalanceAction::Added(AddLiquidityReceipt {
                base_used: 200_000,
                quote_used: 100_000,
                units: 141_421,
            })
        );
        assert_eq!(f.state.quote_balance, 0);
        // Out of quote: nothing more can be paired.
        assert_eq!(f.run().0, RebalanceAction::Hold);
    }

    #[test]
    fn no_quote_inventory_holds() {
        let mut f = fixture(1_000_000, 0, 8_000);
        let (action, events) = f.run();
        assert_eq!(action, RebalanceAction::Hold);
        assert!(events.is_empty());
        assert_eq!(f.state.idle_balance, 1_000_000);
    }

    #[test]
    fn drift_inside_threshold_holds() {
        let mut f = fixture(1_000_000, 1_000_000, 8_000);
        f.run();
        // Target moves 4% away; a 5% band absorbs it.
        f.state.config.target_allocation_bps = 8_400;
        f.state.config.rebalance_threshold_bps = 500;
        assert_eq!(f.run().0, RebalanceAction::Hold);
        f.state.config.rebalance_threshold_bps = 300;
        assert!(matches!(f.run().0, RebalanceAction::Added(_)));
    }

    #[test]
    fn ensure_idle_pulls_exactly_enough() {
        let mut f = fixture(1_000_000, 1_000_000, 8_000);
        f.run();
        let mut state = f.state.clone();
        let mut events = Vec::new();
        f.policy()
            .ensure_idle_liquidity(&mut state, 500_000, &mut events)
            .unwrap();
        assert_eq!(state.idle_balance, 500_000);
        assert_eq!(state.pool_position_units, 565_685 - 212_132);
        assert_eq!(events.len(), 1);

        // Already enough idle: no pool call.
        let mut events = Vec::new();
        f.policy()
            .ensure_idle_liquidity(&mut state, 400_000, &mut events)
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn ensure_idle_fails_when_everything_is_not_enough() {
        let mut f = fixture(1_000_000, 1_000_000, 8_000);
        f.run();
        let mut state = f.state.clone();
        let err = f
            .policy()
            .ensure_idle_liquidity(&mut state, 1_000_001, &mut Vec::new())
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::InsufficientBalance {
                needed: 1_000_001,
                available: 999_999,
            }
        );
    }
}
