//! Orders and their frozen line items.

use chrono::{DateTime, Utc};
use common::ActorId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;
use crate::product::ProductId;
use crate::status::OrderStatus;

/// Unique identifier for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random order ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an order ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OrderId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<OrderId> for Uuid {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

/// Unique identifier for an order line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(Uuid);

impl LineId {
    /// Creates a new random line ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a line ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for LineId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<LineId> for Uuid {
    fn from(id: LineId) -> Self {
        id.0
    }
}

/// How an order was paid.
///
/// Recorded metadata only: settlement always funds the payment from the
/// ledger account named in the pay call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Paid from the campus account balance.
    Balance,

    /// Paid with a prepaid voucher credited to the account beforehand.
    Voucher,
}

impl PaymentMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Balance => "Balance",
            PaymentMethod::Voucher => "Voucher",
        }
    }

    /// Parses a method from its `as_str` form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Balance" => Some(PaymentMethod::Balance),
            "Voucher" => Some(PaymentMethod::Voucher),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the order's total has been settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// No successful payment yet.
    #[default]
    Unpaid,

    /// The total has been debited.
    Paid,
}

impl PaymentStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Paid => "Paid",
        }
    }

    /// Parses a status from its `as_str` form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Unpaid" => Some(PaymentStatus::Unpaid),
            "Paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An order header.
///
/// Orders are never deleted; terminal statuses are final. The total is
/// fixed at creation (post-discount) and always equals the sum of the
/// line subtotals under the identity discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,

    /// Actor the order belongs to.
    pub owner: ActorId,

    /// Total amount to settle, post-discount.
    pub total: Money,

    /// Lifecycle status.
    pub status: OrderStatus,

    /// How the order was paid, once it has been.
    pub payment_method: Option<PaymentMethod>,

    /// Whether the total has been settled.
    pub payment_status: PaymentStatus,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// When the order last changed.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending, unpaid order.
    pub fn create(owner: ActorId, total: Money) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            owner,
            total,
            status: OrderStatus::Pending,
            payment_method: None,
            payment_status: PaymentStatus::Unpaid,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the given actor owns this order.
    pub fn is_owned_by(&self, actor: ActorId) -> bool {
        self.owner == actor
    }
}

/// One line of an order.
///
/// Unit price and subtotal are frozen when the order is created; later
/// catalog price changes never touch an existing line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Unique line identifier.
    pub id: LineId,

    /// Order this line belongs to.
    pub order_id: OrderId,

    /// Product ordered.
    pub product_id: ProductId,

    /// Quantity ordered; always positive.
    pub quantity: u32,

    /// Unit price frozen at creation.
    pub unit_price: Money,

    /// `unit_price * quantity`, frozen at creation.
    pub subtotal: Money,
}

impl OrderLine {
    /// Creates a line for an order, freezing the unit price and subtotal.
    pub fn new(
        order_id: OrderId,
        product_id: impl Into<ProductId>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: LineId::new(),
            order_id,
            product_id: product_id.into(),
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
        }
    }
}
