//! # Vault Records
//!
//! Structured records of what a vault did, for off-chain monitoring. Only
//! committed operations produce records: events raised inside a unit of
//! work that later fails are discarded with the working copy.

use chrono::{DateTime, Utc};
use pulse_protocol::types::{Address, Amount, AssetId, Bps};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something a vault did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VaultEvent {
    /// The factory created a vault.
    VaultCreated {
        /// Vault account.
        vault: Address,
        /// Share token registered for it.
        share_asset: AssetId,
        /// Deposit asset.
        base_asset: AssetId,
        /// External event id.
        event_id: u64,
    },
    /// Base asset in, shares out.
    Deposit {
        /// Depositor.
        caller: Address,
        /// Base asset deposited.
        amount: Amount,
        /// Shares minted.
        shares: Amount,
    },
    /// Shares in, base asset out.
    Withdraw {
        /// Withdrawer.
        caller: Address,
        /// Shares burned.
        shares: Amount,
        /// Base asset delivered to the caller.
        net_amount: Amount,
        /// Base asset delivered to the treasury.
        fee: Amount,
    },
    /// Value moved into the pool.
    LiquidityAdded {
        /// Base asset deposited into the pool.
        base_amount: Amount,
        /// Quote asset deposited into the pool.
        quote_amount: Amount,
        /// Position units received.
        units: Amount,
    },
    /// Value moved out of the pool.
    LiquidityRemoved {
        /// Position units redeemed.
        units: Amount,
        /// Base asset received.
        base_amount: Amount,
        /// Quote asset received.
        quote_amount: Amount,
    },
    /// Yield reinvested into the pool.
    YieldDistributed {
        /// Base asset reinvested.
        amount: Amount,
    },
    /// The owner switched the vault off.
    Deactivated {
        /// Who did it.
        caller: Address,
    },
    /// The owner changed a configuration field.
    ConfigUpdated {
        /// Field name.
        field: String,
        /// Previous value.
        old: Bps,
        /// New value.
        new: Bps,
    },
    /// The owner supplied quote inventory.
    QuoteProvisioned {
        /// Who supplied it.
        caller: Address,
        /// Quote asset received.
        amount: Amount,
    },
}

impl VaultEvent {
    /// Short name, for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultEvent::VaultCreated { .. } => "vault_created",
            VaultEvent::Deposit { .. } => "deposit",
            VaultEvent::Withdraw { .. } => "withdraw",
            VaultEvent::LiquidityAdded { .. } => "liquidity_added",
            VaultEvent::LiquidityRemoved { .. } => "liquidity_removed",
            VaultEvent::YieldDistributed { .. } => "yield_distributed",
            VaultEvent::Deactivated { .. } => "deactivated",
            VaultEvent::ConfigUpdated { .. } => "config_updated",
            VaultEvent::QuoteProvisioned { .. } => "quote_provisioned",
        }
    }
}

/// A committed event with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Emitting vault.
    pub vault_id: Uuid,
    /// Position in the vault's event stream, starting at zero.
    pub sequence: u64,
    /// Commit time.
    pub at: DateTime<Utc>,
    /// What happened.
    pub event: VaultEvent,
}

impl EventRecord {
    /// Writes the record to the structured log.
    pub(crate) fn emit(&self) {
        let payload = serde_json::to_string(&self.event).unwrap_or_default();
        tracing::info!(
            vault_id = %self.vault_id,
            sequence = self.sequence,
            kind = self.event.kind(),
            payload = %payload,
            "vault event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = VaultEvent::Deposit {
            caller: "alice".into(),
            amount: 1_000,
            shares: 1_000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "deposit");
        assert_eq!(json["amount"], 1_000);
        assert_eq!(event.kind(), "deposit");
    }
}
