//! # In-Memory Ledger
//!
//! A complete [`AssetLedger`] held in process memory. It backs the test
//! suites, the benches and the `simulate` command.
//!
//! ## Transactions
//!
//! [`InMemoryLedger`] also implements [`Transactional`]. `begin()` takes the
//! host gate (a reentrant lock, so one thread may nest) and snapshots the
//! books; rolling back restores the snapshot. Every read and write outside
//! the open transaction goes through the same gate, so another thread never
//! sees uncommitted balances and a rollback never erases its writes.

use std::collections::HashMap;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};

use super::{AssetInfo, AssetLedger, LedgerError};
use crate::host::{HostTransaction, Transactional};
use crate::types::{Address, Amount, AssetId};

#[derive(Debug, Clone)]
struct AssetEntry {
    info: AssetInfo,
    minter: Address,
    total_supply: Amount,
}

/// Everything the ledger knows. Cloned wholesale for rollback snapshots.
#[derive(Debug, Clone, Default)]
struct Books {
    assets: HashMap<AssetId, AssetEntry>,
    balances: HashMap<(AssetId, Address), Amount>,
    allowances: HashMap<(AssetId, Address, Address), Amount>,
}

impl Books {
    fn entry(&self, asset: &AssetId) -> Result<&AssetEntry, LedgerError> {
        self.assets
            .get(asset)
            .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))
    }

    fn balance(&self, asset: &AssetId, who: &Address) -> Amount {
        self.balances
            .get(&(asset.clone(), who.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn debit(&mut self, asset: &AssetId, who: &Address, amount: Amount) -> Result<(), LedgerError> {
        let available = self.balance(asset, who);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: asset.clone(),
                who: who.clone(),
                available,
                requested: amount,
            });
        }
        self.balances
            .insert((asset.clone(), who.clone()), available - amount);
        Ok(())
    }

    fn credit(&mut self, asset: &AssetId, who: &Address, amount: Amount) -> Result<(), LedgerError> {
        let current = self.balance(asset, who);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                asset: asset.clone(),
            })?;
        self.balances.insert((asset.clone(), who.clone()), updated);
        Ok(())
    }

    fn move_funds(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.entry(asset)?;
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }

    fn require_minter(&self, asset: &AssetId, caller: &Address) -> Result<(), LedgerError> {
        if &self.entry(asset)?.minter != caller {
            return Err(LedgerError::UnauthorizedMinter {
                asset: asset.clone(),
                caller: caller.clone(),
            });
        }
        Ok(())
    }
}

/// A thread-safe, rollback-capable asset ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    books: RwLock<Books>,
    gate: ReentrantMutex<()>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered assets.
    pub fn asset_count(&self) -> usize {
        self.read(|books| books.assets.len())
    }

    fn read<R>(&self, f: impl FnOnce(&Books) -> R) -> R {
        let _gate = self.gate.lock();
        let books = self.books.read();
        f(&books)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Books) -> R) -> R {
        let _gate = self.gate.lock();
        let mut books = self.books.write();
        f(&mut books)
    }
}

impl AssetLedger for InMemoryLedger {
    fn register_asset(&self, info: AssetInfo, minter: Address) -> Result<(), LedgerError> {
        self.write(|books| {
            if books.assets.contains_key(&info.asset_id) {
                return Err(LedgerError::AssetExists(info.asset_id));
            }
            tracing::debug!(asset = %info.asset_id, minter = %minter, "asset registered");
            books.assets.insert(
                info.asset_id.clone(),
                AssetEntry {
                    info,
                    minter,
                    total_supply: 0,
                },
            );
            Ok(())
        })
    }

    fn asset_info(&self, asset: &AssetId) -> Option<AssetInfo> {
        self.read(|books| books.assets.get(asset).map(|e| e.info.clone()))
    }

    fn balance_of(&self, asset: &AssetId, who: &Address) -> Amount {
        self.read(|books| books.balance(asset, who))
    }

    fn total_supply(&self, asset: &AssetId) -> Amount {
        self.read(|books| {
            books
                .assets
                .get(asset)
                .map(|e| e.total_supply)
                .unwrap_or(0)
        })
    }

    fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> Amount {
        self.read(|books| {
            books
                .allowances
                .get(&(asset.clone(), owner.clone(), spender.clone()))
                .copied()
                .unwrap_or(0)
        })
    }

    fn transfer(
        &self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.write(|books| books.move_funds(asset, from, to, amount))
    }

    fn approve(
        &self,
        asset: &AssetId,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.write(|books| {
            books.entry(asset)?;
            books
                .allowances
                .insert((asset.clone(), owner.clone(), spender.clone()), amount);
            Ok(())
        })
    }

    fn transfer_from(
        &self,
        asset: &AssetId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.write(|books| {
            let key = (asset.clone(), from.clone(), spender.clone());
            let allowance = books.allowances.get(&key).copied().unwrap_or(0);
            if allowance < amount {
                return Err(LedgerError::InsufficientAllowance {
                    asset: asset.clone(),
                    owner: from.clone(),
                    spender: spender.clone(),
                    allowance,
                    requested: amount,
                });
            }
            books.move_funds(asset, from, to, amount)?;
            books.allowances.insert(key, allowance - amount);
            Ok(())
        })
    }

    fn mint(
        &self,
        asset: &AssetId,
        minter: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.write(|books| {
            books.require_minter(asset, minter)?;
            let supply = books.entry(asset)?.total_supply;
            let new_supply = supply.checked_add(amount).ok_or_else(|| LedgerError::Overflow {
                asset: asset.clone(),
            })?;
            books.credit(asset, to, amount)?;
            if let Some(entry) = books.assets.get_mut(asset) {
                entry.total_supply = new_supply;
            }
            Ok(())
        })
    }

    fn burn(
        &self,
        asset: &AssetId,
        minter: &Address,
        from: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.write(|books| {
            books.require_minter(asset, minter)?;
            books.debit(asset, from, amount)?;
            if let Some(entry) = books.assets.get_mut(asset) {
                entry.total_supply = entry.total_supply.saturating_sub(amount);
            }
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

struct LedgerTransaction<'a> {
    ledger: &'a InMemoryLedger,
    snapshot: Option<Books>,
    _gate: ReentrantMutexGuard<'a, ()>,
}

impl HostTransaction for LedgerTransaction<'_> {
    fn commit(mut self: Box<Self>) {
        self.snapshot = None;
    }

    fn rollback(self: Box<Self>) {
        // Drop restores the snapshot.
    }
}

impl Drop for LedgerTransaction<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.ledger.books.write() = snapshot;
            tracing::debug!("ledger transaction rolled back");
        }
    }
}

impl Transactional for InMemoryLedger {
    fn begin(&self) -> Box<dyn HostTransaction + '_> {
        let gate = self.gate.lock();
        let snapshot = self.books.read().clone();
        Box::new(LedgerTransaction {
            ledger: self,
            snapshot: Some(snapshot),
            _gate: gate,
        })
    }
}
