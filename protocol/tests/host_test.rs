//! Integration tests for host transactions.
//!
//! The pool keeps its reserves on the ledger, so a ledger transaction must
//! cover pool effects too: a swap or an add inside a rolled-back
//! transaction leaves no trace.

use std::sync::Arc;

use chrono::Utc;

use pulse_protocol::clock::ManualClock;
use pulse_protocol::host::Transactional;
use pulse_protocol::ledger::{AssetInfo, AssetLedger, InMemoryLedger};
use pulse_protocol::pool::{AddLiquidityRequest, ConstantProductPool, PoolPair, PoolRouter};
use pulse_protocol::types::{Address, AssetId};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn evt() -> AssetId {
    AssetId::from("EVT")
}

fn usdc() -> AssetId {
    AssetId::from("USDC")
}

/// A ledger with EVT and USDC, and a pool seeded at 1M / 500k by `lp`.
fn setup() -> (Arc<InMemoryLedger>, Arc<ConstantProductPool>) {
    let ledger = Arc::new(InMemoryLedger::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let issuer = Address::from("issuer");
    for id in [evt(), usdc()] {
        ledger
            .register_asset(AssetInfo::new(id.clone(), id.to_string(), id.to_string(), 6), issuer.clone())
            .unwrap();
    }
    let pool = Arc::new(
        ConstantProductPool::new(ledger.clone(), clock, "pool".into(), evt(), usdc()).unwrap(),
    );

    let lp = Address::from("lp");
    ledger.mint(&evt(), &issuer, &lp, 1_000_000).unwrap();
    ledger.mint(&usdc(), &issuer, &lp, 500_000).unwrap();
    add(&ledger, &pool, &lp, 1_000_000, 500_000);
    ledger.mint(&evt(), &issuer, &"trader".into(), 100_000).unwrap();
    (ledger, pool)
}

fn add(ledger: &InMemoryLedger, pool: &ConstantProductPool, who: &Address, a: u64, b: u64) {
    ledger.approve(&evt(), who, pool.address(), a).unwrap();
    ledger.approve(&usdc(), who, pool.address(), b).unwrap();
    pool.add_liquidity(&AddLiquidityRequest {
        asset_a: evt(),
        asset_b: usdc(),
        amount_a_desired: a,
        amount_b_desired: b,
        amount_a_min: 0,
        amount_b_min: 0,
        provider: who.clone(),
        recipient: who.clone(),
        deadline: pool.deadline_in(60),
    })
    .unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn rolled_back_swap_restores_reserves_and_balances() {
    let (ledger, pool) = setup();
    let trader = Address::from("trader");
    let before = pool.reserves();

    let tx = ledger.begin();
    let out = pool.swap(&trader, &evt(), 10_000, 0).unwrap();
    assert!(out > 0);
    assert_eq!(ledger.balance_of(&usdc(), &trader), out);
    tx.rollback();

    let after = pool.reserves();
    assert_eq!((after.reserve_a, after.reserve_b), (before.reserve_a, before.reserve_b));
    assert_eq!(ledger.balance_of(&evt(), &trader), 100_000);
    assert_eq!(ledger.balance_of(&usdc(), &trader), 0);
}

#[test]
fn dropped_transaction_rolls_back_an_add() {
    let (ledger, pool) = setup();
    let lp = Address::from("lp");
    ledger.mint(&evt(), &"issuer".into(), &lp, 20_000).unwrap();
    ledger.mint(&usdc(), &"issuer".into(), &lp, 10_000).unwrap();
    let supply = pool.total_supply();

    {
        let _tx = ledger.begin();
        add(&ledger, &pool, &lp, 20_000, 10_000);
        assert!(pool.total_supply() > supply);
    }

    assert_eq!(pool.total_supply(), supply);
    assert_eq!(ledger.balance_of(&evt(), &lp), 20_000);
    assert_eq!(ledger.allowance(&evt(), &lp, pool.address()), 0);
}

#[test]
fn committed_swap_is_kept() {
    let (ledger, pool) = setup();
    let trader = Address::from("trader");

    let tx = ledger.begin();
    let out = pool.swap(&trader, &evt(), 10_000, 0).unwrap();
    tx.commit();

    assert_eq!(ledger.balance_of(&usdc(), &trader), out);
    assert_eq!(pool.reserves().reserve_a, 1_010_000);
}

#[test]
fn transactions_on_other_threads_wait_their_turn() {
    let (ledger, pool) = setup();
    let issuer = Address::from("issuer");
    for who in ["t1", "t2", "t3", "t4"] {
        ledger.mint(&evt(), &issuer, &who.into(), 1_000).unwrap();
    }

    std::thread::scope(|scope| {
        for (i, who) in ["t1", "t2", "t3", "t4"].into_iter().enumerate() {
            let (ledger, pool) = (&ledger, &pool);
            scope.spawn(move || {
                let tx = ledger.begin();
                pool.swap(&who.into(), &evt(), 1_000, 0).unwrap();
                if i % 2 == 0 {
                    tx.commit();
                } else {
                    tx.rollback();
                }
            });
        }
    });

    // Two swaps committed, two rolled back.
    assert_eq!(pool.reserves().reserve_a, 1_002_000);
    assert_eq!(ledger.balance_of(&evt(), &"t2".into()), 1_000);
    assert_eq!(ledger.balance_of(&evt(), &"t4".into()), 1_000);
    assert_eq!(ledger.balance_of(&evt(), &"t1".into()), 0);
}

#[test]
fn rollback_keeps_writes_from_other_threads() {
    let (ledger, _pool) = setup();
    let (alice, bob) = (Address::from("alice"), Address::from("bob"));
    ledger.mint(&usdc(), &"issuer".into(), &alice, 1_000).unwrap();

    std::thread::scope(|scope| {
        let tx = ledger.begin();
        let writer = scope.spawn(|| {
            ledger.transfer(&usdc(), &alice, &bob, 400).unwrap();
        });
        // The other thread's transfer waits for the gate.
        assert_eq!(ledger.balance_of(&usdc(), &bob), 0);
        tx.rollback();
        writer.join().unwrap();
    });

    assert_eq!(ledger.balance_of(&usdc(), &bob), 400);
    assert_eq!(ledger.balance_of(&usdc(), &alice), 600);
}

#[test]
fn other_threads_do_not_see_uncommitted_balances() {
    let (ledger, pool) = setup();
    let trader = Address::from("trader");

    std::thread::scope(|scope| {
        let tx = ledger.begin();
        pool.swap(&trader, &evt(), 10_000, 0).unwrap();
        let reader = scope.spawn(|| ledger.balance_of(&evt(), &trader));
        tx.rollback();
        assert_eq!(reader.join().unwrap(), 100_000);
    });
}
