//! # Vault Errors
//!
//! Every vault operation either commits completely or fails with one of
//! these. There is no retry inside the engine; callers resubmit.

use pulse_protocol::ledger::LedgerError;
use pulse_protocol::math::MathError;
use pulse_protocol::pool::PoolError;
use pulse_protocol::types::Amount;
use thiserror::Error;

/// Errors that can occur during vault and factory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Zero amount, or an amount that would mint/burn nothing.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A share or asset balance is too low.
    #[error("insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance {
        /// What the operation required.
        needed: Amount,
        /// What was there.
        available: Amount,
    },

    /// Withdraw attempted against zero total shares, or shares priced
    /// against zero total assets.
    #[error("insufficient share supply")]
    InsufficientSupply,

    /// Deposits are closed: the owner deactivated the vault.
    #[error("vault is not active")]
    VaultInactive,

    /// Deposits are closed: the vault reached its expiry.
    #[error("vault has expired")]
    VaultExpired,

    /// An owner-only operation was called by someone else.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Asset identity or parameter mismatch.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// A ledger transfer or pool call failed.
    #[error("external call failed: {0}")]
    ExternalCallFailed(String),

    /// A pool operation would not meet its computed floor.
    #[error("slippage exceeded on {what}: minimum {minimum}, actual {actual}")]
    SlippageExceeded {
        /// Which amount violated its floor.
        what: String,
        /// The floor.
        minimum: Amount,
        /// The amount actually produced.
        actual: Amount,
    },

    /// A fixed-point result did not fit, or a divisor was zero where the
    /// books say it cannot be.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

impl From<MathError> for VaultError {
    fn from(_: MathError) -> Self {
        VaultError::ArithmeticOverflow
    }
}

impl From<LedgerError> for VaultError {
    fn from(err: LedgerError) -> Self {
        VaultError::ExternalCallFailed(format!("ledger: {}", err))
    }
}

impl From<PoolError> for VaultError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Slippage {
                asset,
                minimum,
                actual,
            } => VaultError::SlippageExceeded {
                what: asset.to_string(),
                minimum,
                actual,
            },
            other => VaultError::ExternalCallFailed(format!("pool: {}", other)),
        }
    }
}
