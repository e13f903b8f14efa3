//! # Core Identifiers
//!
//! Participants and assets are identified by opaque strings. The ledger
//! does not care whether an [`Address`] is a wallet, a vault, a pool or a
//! treasury -- it only cares that two equal addresses name the same
//! account.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount in an asset's smallest unit. No floating point, ever.
pub type Amount = u64;

/// Basis points: 1 bps = 0.01%, 10_000 bps = 100%.
pub type Bps = u16;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An account on the asset ledger.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps a raw account identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// A fungible asset registered on the ledger (base asset, quote asset,
/// share token, pool-position token).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Wraps a raw asset identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_serializes_as_plain_string() {
        let addr = Address::new("alice");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"alice\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn display_is_the_raw_identifier() {
        assert_eq!(AssetId::from("USDC").to_string(), "USDC");
        assert_eq!(format!("{:?}", Address::from("bob")), "Address(bob)");
    }
}
