//! Settlement error types.

use domain::{OrderId, OrderStatus, ProductId};
use ledger::LedgerError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during settlement operations.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The caller does not own the order.
    #[error("Forbidden")]
    Forbidden,

    /// The order is not in a status that permits the requested action.
    #[error("Invalid transition: cannot {action} an order in {from} status")]
    InvalidTransition {
        from: OrderStatus,
        action: &'static str,
    },

    /// A product could not cover the requested quantity.
    #[error("Insufficient stock for product {product}")]
    InsufficientStock { product: ProductId },

    /// The resolved cart had no lines.
    #[error("Order has no lines")]
    EmptyOrder,

    /// Cart gateway error.
    #[error("Cart gateway error: {0}")]
    Cart(String),

    /// Inventory gateway error.
    #[error("Inventory gateway error: {0}")]
    Inventory(String),

    /// A ledger error occurred.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A storage error occurred.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience type alias for settlement results.
pub type Result<T> = std::result::Result<T, SettlementError>;
