use async_trait::async_trait;

use domain::{Order, OrderId, OrderLine, OrderStatus, PaymentMethod, PaymentStatus};

use crate::Result;

/// Payment fields written alongside a status transition.
#[derive(Debug, Clone, Copy)]
pub struct PaymentUpdate {
    /// How the order was paid.
    pub method: PaymentMethod,

    /// New payment status; `Paid` on the settlement path.
    pub status: PaymentStatus,
}

/// A guarded order status write.
///
/// The write only applies while the row still holds `expected`;
/// otherwise it fails with [`crate::StoreError::StatusConflict`] and
/// nothing changes. Status, payment fields, and `updated_at` land as one
/// all-or-nothing unit.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    /// Status the row must currently hold.
    pub expected: OrderStatus,

    /// Status to move to.
    pub to: OrderStatus,

    /// Payment fields to write, when the transition settles a payment.
    pub payment: Option<PaymentUpdate>,
}

impl StatusTransition {
    /// A plain transition that leaves payment fields untouched.
    pub fn new(expected: OrderStatus, to: OrderStatus) -> Self {
        Self {
            expected,
            to,
            payment: None,
        }
    }

    /// A transition that also records a settled payment.
    pub fn with_payment(expected: OrderStatus, to: OrderStatus, method: PaymentMethod) -> Self {
        Self {
            expected,
            to,
            payment: Some(PaymentUpdate {
                method,
                status: PaymentStatus::Paid,
            }),
        }
    }
}

/// Storage for orders and their frozen line items.
///
/// Orders are never deleted; lines are written once at creation and
/// never change afterwards.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts an order header and all of its lines atomically.
    async fn insert_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()>;

    /// Fetches an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Fetches the lines of an order in insertion order.
    async fn lines_for_order(&self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Applies a guarded status transition, refreshing `updated_at`.
    ///
    /// Fails with [`crate::StoreError::OrderNotFound`] when the order is
    /// missing and [`crate::StoreError::StatusConflict`] when another
    /// transition got there first.
    async fn transition_order(&self, order_id: OrderId, transition: StatusTransition)
    -> Result<()>;
}
