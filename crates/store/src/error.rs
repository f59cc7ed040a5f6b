use thiserror::Error;

use domain::{AccountId, OrderId, OrderStatus};

use crate::compensation::CompensationId;

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A balance mutation lost the optimistic concurrency check.
    /// The expected account version did not match the actual version.
    #[error(
        "Version conflict for account {account_id}: expected version {expected}, found {actual}"
    )]
    VersionConflict {
        account_id: AccountId,
        expected: i64,
        actual: i64,
    },

    /// A guarded order transition found a different current status.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// An account with this ID already exists.
    #[error("Account already exists: {0}")]
    AccountExists(AccountId),

    /// The account targeted by a mutation was not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The order targeted by a mutation was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The pending-compensation record was not found.
    #[error("Pending compensation not found: {0}")]
    CompensationNotFound(CompensationId),

    /// A ledger transaction failed shape validation before any write.
    #[error("Invalid ledger transaction: {0}")]
    InvalidTransaction(String),

    /// A stored row could not be decoded into its domain type.
    #[error("Corrupt row: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
