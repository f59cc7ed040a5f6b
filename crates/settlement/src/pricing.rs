//! Order pricing and the pluggable discount policy.

use domain::{Money, ProductId};

use common::ActorId;

/// One priced line of a would-be order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    /// Product being priced.
    pub product_id: ProductId,

    /// Quantity requested.
    pub quantity: u32,

    /// Current catalog unit price.
    pub unit_price: Money,

    /// `unit_price * quantity`.
    pub subtotal: Money,
}

/// The breakdown a preview returns and a creation persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPreview {
    /// Priced lines in cart order.
    pub lines: Vec<PricedLine>,

    /// Sum of the line subtotals before any discount.
    pub original_total: Money,

    /// Total after the discount policy; what payment will debit.
    pub final_total: Money,
}

/// Eligibility-based discount applied to an order total.
///
/// Pluggable seam: the default policy is the identity multiplier, and
/// orders always persist the post-discount total.
pub trait DiscountPolicy: Send + Sync {
    /// Maps the original total to the total the owner actually pays.
    fn apply(&self, owner: ActorId, original: Money) -> Money;
}

/// The identity discount: everyone pays the original total.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscount;

impl DiscountPolicy for NoDiscount {
    fn apply(&self, _owner: ActorId, original: Money) -> Money {
        original
    }
}
