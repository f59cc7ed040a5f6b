//! Ledger error types.

use domain::{AccountId, Money};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
///
/// Every variant except `Store` is a deterministic validation outcome:
/// repeating the call with the same arguments fails identically, so none
/// of them is ever retried internally.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The amount is zero or negative.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    /// The account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The account exists but does not accept monetary operations.
    #[error("Account not active: {0}")]
    AccountNotActive(AccountId),

    /// The account is closed; closure is terminal.
    #[error("Account is closed: {0}")]
    AccountClosed(AccountId),

    /// The presented secret does not match the stored credential.
    #[error("Invalid credential")]
    InvalidCredential,

    /// The balance does not cover the requested debit.
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Money, available: Money },

    /// The transfer destination does not exist or is not active.
    #[error("Destination account not active: {0}")]
    DestinationNotActive(AccountId),

    /// A transfer named the same account on both sides.
    #[error("Source and destination are the same account: {0}")]
    SameAccount(AccountId),

    /// A storage error occurred.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, LedgerError>;
