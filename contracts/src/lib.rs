//! # MarketPulse Vault Contracts
//!
//! The accounting and rebalancing engine for pooled-liquidity vaults.
//! Users deposit a base asset and receive shares; the vault keeps a target
//! fraction of its assets in an external constant-product pool and pays
//! withdrawals out of idle balance, pulling from the pool when it must.
//!
//! - **Valuation** ([`valuation`]): idle balance plus the base-side value
//!   of the pool position.
//! - **Shares** ([`shares`]): deposit/withdraw conversion and the treasury
//!   fee split.
//! - **Pool adapter** ([`adapter`]): slippage-bounded, re-validated router
//!   calls.
//! - **Rebalancing** ([`rebalance`]): target tracking and on-demand
//!   liquidity for withdrawals.
//! - **Vault** ([`vault`]): the controller and its lifecycle.
//! - **Factory** ([`factory`]): vault creation and the registry.
//!
//! ## Design Principles
//!
//! 1. Integer fixed-point only. Products go through `u128`, every division
//!    rounds down, and any result that does not fit is an error, not a wrap.
//! 2. All or nothing. Each operation runs against a working copy inside a
//!    host transaction; a failure leaves vault, ledger and pool untouched.
//! 3. Callers are explicit. Every operation names who is calling it.
//! 4. Every public state and record type is serde-serializable.

pub mod adapter;
pub mod error;
pub mod events;
pub mod factory;
pub mod rebalance;
pub mod shares;
pub mod state;
pub mod valuation;
pub mod vault;
pub mod yield_policy;

pub use error::VaultError;
pub use events::{EventRecord, VaultEvent};
pub use factory::{FactoryConfig, PoolBinding, VaultFactory, VaultHandle, VaultParams};
pub use state::{VaultConfig, VaultMetadata, VaultState, VaultStatus};
pub use vault::{Collaborators, Vault, WithdrawReceipt};
