//! Settlement service for the campus core.
//!
//! Owns the order lifecycle from priced preview through creation,
//! payment, shipment, and confirmation or cancellation. Payment spans
//! two independently owned resources, the ledger account and the
//! product stock, without a shared commit protocol: the debit happens
//! first, the stock commit second, and a failed commit is undone by a
//! compensating credit written through a durable pending-compensation
//! record.

pub mod error;
pub mod gateways;
pub mod pricing;
pub mod service;

pub use error::{Result, SettlementError};
pub use gateways::{
    CartGateway, CartItemId, CartLine, InMemoryCartGateway, InMemoryInventoryGateway,
    InventoryGateway,
};
pub use pricing::{DiscountPolicy, NoDiscount, OrderPreview, PricedLine};
pub use service::{DetailLine, OrderDetail, OrderReceipt, SettlementService, SweepReport};
