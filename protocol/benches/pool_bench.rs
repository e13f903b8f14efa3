// Pool and fixed-point math benchmarks for MarketPulse.
//
// Covers the u128 mul_div path, integer square root, quoting against the
// constant-product pool, and a swap inside a rolled-back host transaction.

use std::sync::Arc;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pulse_protocol::clock::ManualClock;
use pulse_protocol::host::Transactional;
use pulse_protocol::ledger::{AssetInfo, AssetLedger, InMemoryLedger};
use pulse_protocol::math::{isqrt, mul_div, Rounding};
use pulse_protocol::pool::{AddLiquidityRequest, ConstantProductPool, PoolRouter};
use pulse_protocol::types::{Address, AssetId};

fn seeded_pool() -> (Arc<InMemoryLedger>, ConstantProductPool) {
    let ledger = Arc::new(InMemoryLedger::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let issuer = Address::from("issuer");
    let lp = Address::from("lp");
    for id in ["EVT", "USDC"] {
        ledger
            .register_asset(AssetInfo::new(id.into(), id, id, 6), issuer.clone())
            .unwrap();
        ledger.mint(&id.into(), &issuer, &lp, 1_000_000_000).unwrap();
    }
    ledger.mint(&"EVT".into(), &issuer, &"trader".into(), 1_000_000).unwrap();
    let pool =
        ConstantProductPool::new(ledger.clone(), clock, "pool".into(), "EVT".into(), "USDC".into())
            .unwrap();
    for id in ["EVT", "USDC"] {
        ledger
            .approve(&id.into(), &lp, pool.address(), 1_000_000_000)
            .unwrap();
    }
    pool.add_liquidity(&AddLiquidityRequest {
        asset_a: "EVT".into(),
        asset_b: "USDC".into(),
        amount_a_desired: 1_000_000_000,
        amount_b_desired: 500_000_000,
        amount_a_min: 0,
        amount_b_min: 0,
        provider: lp.clone(),
        recipient: lp,
        deadline: pool.deadline_in(60),
    })
    .unwrap();
    (ledger, pool)
}

fn bench_mul_div(c: &mut Criterion) {
    c.bench_function("math/mul_div_floor", |b| {
        b.iter(|| mul_div(black_box(u64::MAX / 3), black_box(9_999), black_box(10_000), Rounding::Down));
    });
    c.bench_function("math/mul_div_ceil", |b| {
        b.iter(|| mul_div(black_box(123_456_789), black_box(7_071_067), black_box(10_800_000), Rounding::Up));
    });
}

fn bench_isqrt(c: &mut Criterion) {
    let mut group = c.benchmark_group("math/isqrt");
    for n in [1_000_000u128, 1u128 << 64, u128::MAX] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| isqrt(black_box(n)));
        });
    }
    group.finish();
}

fn bench_quote(c: &mut Criterion) {
    let (_ledger, pool) = seeded_pool();
    let path: [AssetId; 2] = ["EVT".into(), "USDC".into()];

    c.bench_function("pool/quote", |b| {
        b.iter(|| pool.quote(black_box(800_000), &path));
    });
}

fn bench_swap_rolled_back(c: &mut Criterion) {
    let (ledger, pool) = seeded_pool();
    let trader = Address::from("trader");
    let evt = AssetId::from("EVT");

    c.bench_function("pool/swap_in_rolled_back_tx", |b| {
        b.iter(|| {
            let tx = ledger.begin();
            let out = pool.swap(&trader, &evt, black_box(10_000), 0);
            tx.rollback();
            out
        });
    });
}

criterion_group!(benches, bench_mul_div, bench_isqrt, bench_quote, bench_swap_rolled_back);
criterion_main!(benches);
