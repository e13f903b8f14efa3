//! # Pool Adapter
//!
//! The only code in the vault that calls the router. Every add and remove
//! goes through the same three steps:
//!
//! 1. Compute slippage floors from the expected amounts.
//! 2. Approve the router for exactly what it may pull, then call it with
//!    those floors and a deadline of `now + LIQUIDITY_DEADLINE_SECS`.
//! 3. Re-check the router's answer against the same floors before anyone
//!    is allowed to book it.
//!
//! Step 3 means a misbehaving router is caught here, not in the books.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pulse_protocol::clock::Clock;
use pulse_protocol::config::LIQUIDITY_DEADLINE_SECS;
use pulse_protocol::ledger::AssetLedger;
use pulse_protocol::math::slippage_floor;
use pulse_protocol::pool::{AddLiquidityRequest, PoolRouter, RemoveLiquidityRequest};
use pulse_protocol::types::{Address, Amount, AssetId, Bps};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::VaultError;

/// What an add actually used and produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityReceipt {
    /// Base asset deposited into the pool.
    pub base_used: Amount,
    /// Quote asset deposited into the pool.
    pub quote_used: Amount,
    /// Position units received.
    pub units: Amount,
}

/// What a remove returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityReceipt {
    /// Base asset received.
    pub base_received: Amount,
    /// Quote asset received.
    pub quote_received: Amount,
}

/// Slippage-bounded access to one vault's pool.
pub struct PoolAdapter {
    router: Arc<dyn PoolRouter>,
    ledger: Arc<dyn AssetLedger>,
    clock: Arc<dyn Clock>,
    vault: Address,
    base_asset: AssetId,
    quote_asset: AssetId,
    position_asset: AssetId,
}

impl PoolAdapter {
    /// Binds an adapter to the vault account and its three assets.
    pub fn new(
        router: Arc<dyn PoolRouter>,
        ledger: Arc<dyn AssetLedger>,
        clock: Arc<dyn Clock>,
        vault: Address,
        base_asset: AssetId,
        quote_asset: AssetId,
        position_asset: AssetId,
    ) -> Self {
        Self {
            router,
            ledger,
            clock,
            vault,
            base_asset,
            quote_asset,
            position_asset,
        }
    }

    /// Amount of `asset_out` equivalent to `amount_in` of `asset_in` at the
    /// pool's current ratio. Read-only.
    pub fn quote(
        &self,
        amount_in: Amount,
        asset_in: &AssetId,
        asset_out: &AssetId,
    ) -> Result<Amount, VaultError> {
        let path = [asset_in.clone(), asset_out.clone()];
        Ok(self.router.quote(amount_in, &path)?)
    }

    fn deadline(&self) -> DateTime<Utc> {
        self.clock.now() + Duration::seconds(LIQUIDITY_DEADLINE_SECS)
    }

    /// Deposits up to `base_amount` base and `quote_desired` quote.
    ///
    /// # Errors
    ///
    /// - [`VaultError::SlippageExceeded`] if either side falls below
    ///   `desired * (10_000 - max_slippage_bps) / 10_000`.
    /// - [`VaultError::ExternalCallFailed`] if the router fails, takes more
    ///   than desired, or mints nothing.
    pub fn add_liquidity(
        &self,
        base_amount: Amount,
        quote_desired: Amount,
        max_slippage_bps: Bps,
    ) -> Result<AddLiquidityReceipt, VaultError> {
        if base_amount == 0 {
            return Err(VaultError::InvalidAmount("add of zero base".into()));
        }
        let min_base = slippage_floor(base_amount, max_slippage_bps)?;
        let min_quote = slippage_floor(quote_desired, max_slippage_bps)?;
        let spender = self.router.address();

        self.ledger
            .approve(&self.base_asset, &self.vault, spender, base_amount)?;
        self.ledger
            .approve(&self.quote_asset, &self.vault, spender, quote_desired)?;

        let outcome = self.router.add_liquidity(&AddLiquidityRequest {
            asset_a: self.base_asset.clone(),
            asset_b: self.quote_asset.clone(),
            amount_a_desired: base_amount,
            amount_b_desired: quote_desired,
            amount_a_min: min_base,
            amount_b_min: min_quote,
            provider: self.vault.clone(),
            recipient: self.vault.clone(),
            deadline: self.deadline(),
        })?;

        check_floor(&self.base_asset, min_base, outcome.amount_a)?;
        check_floor(&self.quote_asset, min_quote, outcome.amount_b)?;
        if outcome.amount_a > base_amount || outcome.amount_b > quote_desired {
            return Err(VaultError::ExternalCallFailed(format!(
                "router used {}/{} against a budget of {}/{}",
                outcome.amount_a, outcome.amount_b, base_amount, quote_desired
            )));
        }
        if outcome.units == 0 {
            return Err(VaultError::ExternalCallFailed(
                "router minted zero position units".into(),
            ));
        }

        // Clear whatever the router did not pull.
        self.ledger.approve(&self.base_asset, &self.vault, spender, 0)?;
        self.ledger.approve(&self.quote_asset, &self.vault, spender, 0)?;

        debug!(
            vault = %self.vault,
            base = outcome.amount_a,
            quote = outcome.amount_b,
            units = outcome.units,
            "liquidity added"
        );
        Ok(AddLiquidityReceipt {
            base_used: outcome.amount_a,
            quote_used: outcome.amount_b,
            units: outcome.units,
        })
    }

    /// Redeems `units` position units, expecting roughly `expected_base`
    /// and `expected_quote` back.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidAmount`] for zero units; otherwise as
    /// [`add_liquidity`](Self::add_liquidity).
    pub fn remove_liquidity(
        &self,
        units: Amount,
        expected_base: Amount,
        expected_quote: Amount,
        max_slippage_bps: Bps,
    ) -> Result<RemoveLiquidityReceipt, VaultError> {
        if units == 0 {
            return Err(VaultError::InvalidAmount("remove of zero units".into()));
        }
        let min_base = slippage_floor(expected_base, max_slippage_bps)?;
        let min_quote = slippage_floor(expected_quote, max_slippage_bps)?;
        let spender = self.router.address();

        self.ledger
            .approve(&self.position_asset, &self.vault, spender, units)?;

        let outcome = self.router.remove_liquidity(&RemoveLiquidityRequest {
            asset_a: self.base_asset.clone(),
            asset_b: self.quote_asset.clone(),
            units,
            amount_a_min: min_base,
            amount_b_min: min_quote,
            provider: self.vault.clone(),
            recipient: self.vault.clone(),
            deadline: self.deadline(),
        })?;

        check_floor(&self.base_asset, min_base, outcome.amount_a)?;
        check_floor(&self.quote_asset, min_quote, outcome.amount_b)?;

        debug!(
            vault = %self.vault,
            units,
            base = outcome.amount_a,
            quote = outcome.amount_b,
            "liquidity removed"
        );
        Ok(RemoveLiquidityReceipt {
            base_received: outcome.amount_a,
            quote_received: outcome.amount_b,
        })
    }
}

fn check_floor(asset: &AssetId, minimum: Amount, actual: Amount) -> Result<(), VaultError> {
    if actual < minimum {
        return Err(VaultError::SlippageExceeded {
            what: asset.to_string(),
            minimum,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_protocol::clock::ManualClock;
    use pulse_protocol::ledger::{AssetInfo, InMemoryLedger};
    use pulse_protocol::pool::{
        AddLiquidityOutcome, ConstantProductPool, PoolError, PoolPair, RemoveLiquidityOutcome,
    };

    fn evt() -> AssetId {
        "EVT".into()
    }

    fn usdc() -> AssetId {
        "USDC".into()
    }

    fn vault() -> Address {
        "vault".into()
    }

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        pool: Arc<ConstantProductPool>,
        adapter: PoolAdapter,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let treasury: Address = "mint".into();
        for id in [evt(), usdc()] {
            ledger
                .register_asset(
                    AssetInfo::new(id.clone(), id.to_string(), id.to_string(), 6),
                    treasury.clone(),
                )
                .unwrap();
        }
        let pool = Arc::new(
            ConstantProductPool::new(ledger.clone(), clock.clone(), "pool".into(), evt(), usdc())
                .unwrap(),
        );
        // Seed the pool at 2 EVT per USDC.
        let seeder: Address = "seeder".into();
        ledger.mint(&evt(), &treasury, &seeder, 10_000_000).unwrap();
        ledger.mint(&usdc(), &treasury, &seeder, 5_000_000).unwrap();
        ledger.approve(&evt(), &seeder, &"pool".into(), 10_000_000).unwrap();
        ledger.approve(&usdc(), &seeder, &"pool".into(), 5_000_000).unwrap();
        pool.add_liquidity(&AddLiquidityRequest {
            asset_a: evt(),
            asset_b: usdc(),
            amount_a_desired: 10_000_000,
            amount_b_desired: 5_000_000,
            amount_a_min: 0,
            amount_b_min: 0,
            provider: seeder.clone(),
            recipient: seeder,
            deadline: pool.deadline_in(60),
        })
        .unwrap();

        ledger.mint(&evt(), &treasury, &vault(), 1_000_000).unwrap();
        ledger.mint(&usdc(), &treasury, &vault(), 1_000_000).unwrap();

        let adapter = PoolAdapter::new(
            pool.clone(),
            ledger.clone(),
            clock,
            vault(),
            evt(),
            usdc(),
            pool.position_asset().clone(),
        );
        Fixture {
            ledger,
            pool,
            adapter,
        }
    }

    #[test]
    fn quote_follows_reserve_ratio() {
        let f = fixture();
        assert_eq!(f.adapter.quote(800_000, &evt(), &usdc()).unwrap(), 400_000);
        assert_eq!(f.adapter.quote(400_000, &usdc(), &evt()).unwrap(), 800_000);
    }

    #[test]
    fn add_then_remove_moves_both_sides() {
        let f = fixture();
        let added = f.adapter.add_liquidity(800_000, 400_000, 100).unwrap();
        assert_eq!(added.base_used, 800_000);
        assert_eq!(added.quote_used, 400_000);
        assert_eq!(added.units, 565_685);
        assert_eq!(
            f.ledger.balance_of(f.pool.position_asset(), &vault()),
            565_685
        );
        // Leftover approvals are cleared.
        assert_eq!(f.ledger.allowance(&evt(), &vault(), &"pool".into()), 0);

        let removed = f
            .adapter
            .remove_liquidity(565_685, 799_999, 399_999, 100)
            .unwrap();
        assert_eq!(removed.base_received, 799_999);
        assert_eq!(removed.quote_received, 399_999);
    }

    #[test]
    fn floors_are_enforced_by_the_router() {
        let f = fixture();
        // Only 200_000 USDC offered for 800_000 EVT: the pool can use at most
        // 400_000 EVT, far below a 1% floor on 800_000.
        let err = f.adapter.add_liquidity(800_000, 200_000, 100).unwrap_err();
        assert!(matches!(err, VaultError::SlippageExceeded { .. }));
    }

    #[test]
    fn zero_units_rejected_before_calling_router() {
        let f = fixture();
        assert!(matches!(
            f.adapter.remove_liquidity(0, 0, 0, 100),
            Err(VaultError::InvalidAmount(_))
        ));
    }

    /// A router that claims success but under-delivers.
    struct ShortChangingRouter {
        address: Address,
    }

    impl PoolRouter for ShortChangingRouter {
        fn address(&self) -> &Address {
            &self.address
        }

        fn quote(&self, amount_in: Amount, _path: &[AssetId]) -> Result<Amount, PoolError> {
            Ok(amount_in)
        }

        fn add_liquidity(
            &self,
            request: &AddLiquidityRequest,
        ) -> Result<AddLiquidityOutcome, PoolError> {
            Ok(AddLiquidityOutcome {
                amount_a: request.amount_a_desired,
                amount_b: request.amount_b_desired,
                units: 0,
            })
        }

        fn remove_liquidity(
            &self,
            request: &RemoveLiquidityRequest,
        ) -> Result<RemoveLiquidityOutcome, PoolError> {
            Ok(RemoveLiquidityOutcome {
                amount_a: request.amount_a_min.saturating_sub(1),
                amount_b: request.amount_b_min,
            })
        }
    }

    #[test]
    fn router_results_are_revalidated() {
        let ledger = Arc::new(InMemoryLedger::new());
        for id in [evt(), usdc(), "LP".into()] {
            ledger
                .register_asset(AssetInfo::new(id, "x", "x", 6), "mint".into())
                .unwrap();
        }
        let adapter = PoolAdapter::new(
            Arc::new(ShortChangingRouter {
                address: "router".into(),
            }),
            ledger,
            Arc::new(ManualClock::default()),
            vault(),
            evt(),
            usdc(),
            "LP".into(),
        );
        assert!(matches!(
            adapter.add_liquidity(100, 100, 0),
            Err(VaultError::ExternalCallFailed(_))
        ));
        assert!(matches!(
            adapter.remove_liquidity(10, 100, 100, 0),
            Err(VaultError::SlippageExceeded { .. })
        ));
    }
}
