// Vault operation benchmarks for MarketPulse.
//
// Covers share math, a deposit that rebalances into the pool, and a
// deposit/withdraw round trip through the full unit of work.

use std::sync::Arc;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pulse_contracts::shares::{apply_fee, shares_for_deposit};
use pulse_contracts::{FactoryConfig, PoolBinding, VaultFactory, VaultHandle, VaultParams};
use pulse_protocol::clock::ManualClock;
use pulse_protocol::ledger::{AssetInfo, AssetLedger, InMemoryLedger};
use pulse_protocol::pool::{AddLiquidityRequest, ConstantProductPool, PoolRouter};
use pulse_protocol::types::Address;

const FUNDS: u64 = 1_000_000_000_000;

/// A funded depositor, a seeded pool and one vault with quote inventory.
fn setup() -> (Arc<InMemoryLedger>, VaultHandle) {
    let ledger = Arc::new(InMemoryLedger::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let issuer = Address::from("issuer");
    let owner = Address::from("owner");
    let lp = Address::from("lp");
    for id in ["EVT", "USDC"] {
        ledger
            .register_asset(AssetInfo::new(id.into(), id, id, 6), issuer.clone())
            .unwrap();
        ledger.mint(&id.into(), &issuer, &lp, FUNDS).unwrap();
        ledger.mint(&id.into(), &issuer, &owner, FUNDS).unwrap();
    }
    ledger.mint(&"EVT".into(), &issuer, &"alice".into(), FUNDS).unwrap();

    let pool = Arc::new(
        ConstantProductPool::new(ledger.clone(), clock.clone(), "pool".into(), "EVT".into(), "USDC".into())
            .unwrap(),
    );
    for id in ["EVT", "USDC"] {
        ledger.approve(&id.into(), &lp, pool.address(), FUNDS).unwrap();
    }
    pool.add_liquidity(&AddLiquidityRequest {
        asset_a: "EVT".into(),
        asset_b: "USDC".into(),
        amount_a_desired: FUNDS,
        amount_b_desired: FUNDS / 2,
        amount_a_min: 0,
        amount_b_min: 0,
        provider: lp.clone(),
        recipient: lp,
        deadline: pool.deadline_in(60),
    })
    .unwrap();

    let mut factory = VaultFactory::new(
        FactoryConfig {
            owner: owner.clone(),
            treasury: "treasury".into(),
            treasury_fee_bps: 50,
            quote_asset: "USDC".into(),
        },
        ledger.clone(),
        ledger.clone(),
        clock,
    )
    .unwrap();
    let vault = factory
        .create_vault(
            &owner,
            VaultParams::new("EVT".into(), 1, "Bench", "vB"),
            PoolBinding::from_pool(pool),
        )
        .unwrap();
    {
        let mut v = vault.lock();
        ledger.approve(&"USDC".into(), &owner, v.address(), FUNDS).unwrap();
        v.provision_quote(&owner, FUNDS).unwrap();
        ledger.approve(&"EVT".into(), &"alice".into(), v.address(), FUNDS).unwrap();
    }
    (ledger, vault)
}

fn bench_share_math(c: &mut Criterion) {
    c.bench_function("shares/for_deposit", |b| {
        b.iter(|| shares_for_deposit(black_box(250_000), black_box(999_999), black_box(1_000_000)));
    });
    c.bench_function("shares/apply_fee", |b| {
        b.iter(|| apply_fee(black_box(499_999), black_box(50)));
    });
}

fn bench_deposit(c: &mut Criterion) {
    let (_ledger, vault) = setup();
    let alice = Address::from("alice");

    c.bench_function("vault/deposit_with_rebalance", |b| {
        b.iter(|| {
            let mut v = vault.lock();
            let shares = v.deposit(&alice, black_box(10_000));
            v.drain_events();
            shares
        });
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let (_ledger, vault) = setup();
    let alice = Address::from("alice");

    c.bench_function("vault/deposit_then_withdraw", |b| {
        b.iter(|| {
            let mut v = vault.lock();
            if let Ok(shares) = v.deposit(&alice, black_box(10_000)) {
                let _ = v.withdraw(&alice, shares);
            }
            v.drain_events();
        });
    });
}

criterion_group!(benches, bench_share_math, bench_deposit, bench_round_trip);
criterion_main!(benches);
