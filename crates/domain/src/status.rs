//! Order status machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its settlement lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Paid ──► Shipped ──► Completed
///    │          └────────────────► Completed
///    └──► Cancelled
/// ```
///
/// Status only moves forward along these edges; there are no reverse
/// moves, and terminal states accept nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order is created and priced, awaiting payment.
    #[default]
    Pending,

    /// Payment settled and stock committed, awaiting shipment.
    Paid,

    /// Order has been handed to fulfilment.
    Shipped,

    /// Buyer confirmed receipt (terminal state).
    Completed,

    /// Order was cancelled before payment (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can be paid in this status.
    pub fn can_pay(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be shipped in this status.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    /// Returns true if receipt can be confirmed in this status.
    ///
    /// Confirmation is accepted straight from `Paid` as well as from
    /// `Shipped`, covering in-person pickup where nothing ships.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Shipped)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a status from its `as_str` form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(OrderStatus::Pending),
            "Paid" => Some(OrderStatus::Paid),
            "Shipped" => Some(OrderStatus::Shipped),
            "Completed" => Some(OrderStatus::Completed),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
