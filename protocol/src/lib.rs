// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # MarketPulse Protocol: Core Library
//!
//! Everything the vault engine stands on that is not the vault itself:
//! identifiers, fixed-point math, protocol constants, and the contracts of
//! the systems a vault talks to. Each contract ships with a deterministic
//! in-memory implementation, so the whole stack runs in a unit test.
//!
//! ## Architecture
//!
//! - **types**: `Address`, `AssetId`, `Amount`, `Bps`. Strings with manners.
//! - **math**: `u128`-backed `mul_div`, basis points, slippage floors,
//!   integer square root. No floats were harmed.
//! - **config**: Protocol constants: bounds, defaults, deadlines.
//! - **clock**: `Clock` trait, a system clock, and a manual clock for tests.
//! - **host**: `Transactional`: begin, commit, roll back. Drop means no.
//! - **ledger**: `AssetLedger` for fungible balances and allowances, plus
//!   `InMemoryLedger`.
//! - **pool**: `PoolRouter` and `PoolPair`, plus `ConstantProductPool`,
//!   an `x * y = k` pair that keeps its reserves on the ledger.
//!
//! ## Design Philosophy
//!
//! 1. If it touches money, it is an integer, and it rounds down.
//! 2. Collaborators are traits. The vault never knows which ledger it has.
//! 3. Every failure is a typed error; nothing in here panics on bad input.
//! 4. If it touches money, it has tests. Plural.

pub mod clock;
pub mod config;
pub mod host;
pub mod ledger;
pub mod math;
pub mod pool;
pub mod types;
