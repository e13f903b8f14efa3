//! # Share Arithmetic
//!
//! Converts between base-asset amounts and vault shares at the current
//! `total_assets / share_supply` ratio. Pure functions: no ledger, no pool.
//!
//! Every division rounds down. On deposit that means the depositor may
//! receive slightly fewer shares; on withdraw, slightly fewer tokens. The
//! remainder stays in the vault and accrues to the remaining holders.

use pulse_protocol::math::{bps_of, mul_div_floor};
use pulse_protocol::types::{Amount, Bps};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// A gross withdrawal split into what the caller gets and what the
/// treasury keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    /// Delivered to the caller.
    pub net: Amount,
    /// Delivered to the treasury.
    pub fee: Amount,
}

/// Shares to mint for a deposit of `amount`.
///
/// An empty vault prices shares 1:1; otherwise
/// `amount * share_supply / total_assets`, rounded down.
///
/// # Errors
///
/// - [`VaultError::InvalidAmount`] for a zero deposit, or one too small to
///   mint a single share.
/// - [`VaultError::InsufficientSupply`] when shares exist but back no
///   assets (the price is undefined).
pub fn shares_for_deposit(
    amount: Amount,
    total_assets_before: Amount,
    share_supply_before: Amount,
) -> Result<Amount, VaultError> {
    if amount == 0 {
        return Err(VaultError::InvalidAmount("deposit amount must be positive".into()));
    }
    if share_supply_before == 0 {
        return Ok(amount);
    }
    if total_assets_before == 0 {
        return Err(VaultError::InsufficientSupply);
    }
    let shares = mul_div_floor(amount, share_supply_before, total_assets_before)?;
    if shares == 0 {
        return Err(VaultError::InvalidAmount(format!(
            "deposit of {} mints zero shares",
            amount
        )));
    }
    Ok(shares)
}

/// Base asset owed for burning `shares`, before fees:
/// `shares * total_assets / share_supply`, rounded down.
///
/// The caller's own share balance is checked by the controller against the
/// share ledger; this only checks the shares exist at all.
pub fn tokens_for_withdraw(
    shares: Amount,
    total_assets: Amount,
    share_supply: Amount,
) -> Result<Amount, VaultError> {
    if shares == 0 {
        return Err(VaultError::InvalidAmount("shares must be positive".into()));
    }
    if share_supply == 0 {
        return Err(VaultError::InsufficientSupply);
    }
    if shares > share_supply {
        return Err(VaultError::InsufficientBalance {
            needed: shares,
            available: share_supply,
        });
    }
    Ok(mul_div_floor(shares, total_assets, share_supply)?)
}

/// Splits a gross amount into net and treasury fee.
pub fn apply_fee(gross: Amount, fee_bps: Bps) -> Result<FeeSplit, VaultError> {
    let fee = bps_of(gross, fee_bps)?;
    Ok(FeeSplit {
        net: gross - fee,
        fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_vault_mints_one_to_one() {
        for amount in [1, 7, 1_000_000, u64::MAX] {
            assert_eq!(shares_for_deposit(amount, 0, 0).unwrap(), amount);
        }
    }

    #[test]
    fn later_deposits_are_proportional_and_round_down() {
        // Share price 1.5: 1_500 assets back 1_000 shares.
        assert_eq!(shares_for_deposit(300, 1_500, 1_000).unwrap(), 200);
        assert_eq!(shares_for_deposit(301, 1_500, 1_000).unwrap(), 200);
    }

    #[test]
    fn zero_deposit_rejected() {
        assert!(matches!(
            shares_for_deposit(0, 0, 0),
            Err(VaultError::InvalidAmount(_))
        ));
    }

    #[test]
    fn dust_deposit_that_mints_nothing_rejected() {
        assert!(matches!(
            shares_for_deposit(1, 1_000, 10),
            Err(VaultError::InvalidAmount(_))
        ));
    }

    #[test]
    fn drained_vault_rejects_deposits() {
        assert_eq!(
            shares_for_deposit(100, 0, 1_000),
            Err(VaultError::InsufficientSupply)
        );
    }

    #[test]
    fn withdraw_is_proportional() {
        assert_eq!(tokens_for_withdraw(500_000, 1_000_000, 1_000_000).unwrap(), 500_000);
        assert_eq!(tokens_for_withdraw(1, 10, 3).unwrap(), 3);
    }

    #[test]
    fn withdraw_guards() {
        assert!(matches!(
            tokens_for_withdraw(0, 10, 10),
            Err(VaultError::InvalidAmount(_))
        ));
        assert_eq!(
            tokens_for_withdraw(1, 10, 0),
            Err(VaultError::InsufficientSupply)
        );
        assert!(matches!(
            tokens_for_withdraw(11, 10, 10),
            Err(VaultError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn fee_split_matches_reference_example() {
        let split = apply_fee(500_000, 50).unwrap();
        assert_eq!(split, FeeSplit { net: 497_500, fee: 2_500 });
    }

    #[test]
    fn fee_truncates() {
        // 0.5% of 199 is 0.995 -> 0 fee.
        assert_eq!(apply_fee(199, 50).unwrap(), FeeSplit { net: 199, fee: 0 });
    }
}
