//! # Host Transactions
//!
//! A vault operation touches three kinds of state: its own books, the asset
//! ledger, and the pool. All of it must commit together or not at all. The
//! vault handles its own books with a working copy; this module is the
//! contract the collaborators implement so their side can be rolled back
//! too.
//!
//! ```text
//! let tx = host.begin();
//! ... ledger transfers, pool calls ...
//! tx.commit();        // or tx.rollback(), or just drop it
//! ```

/// A collaborator that can group its effects into an all-or-nothing unit.
pub trait Transactional: Send + Sync {
    /// Opens a transaction. Effects performed through the host while the
    /// returned handle is alive belong to it.
    fn begin(&self) -> Box<dyn HostTransaction + '_>;
}

/// An open host transaction.
///
/// Dropping the handle without calling [`commit`](HostTransaction::commit)
/// rolls every effect back.
pub trait HostTransaction {
    /// Makes every effect since `begin` permanent.
    fn commit(self: Box<Self>);

    /// Discards every effect since `begin`.
    fn rollback(self: Box<Self>);
}
