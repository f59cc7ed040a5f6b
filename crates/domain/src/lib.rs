//! Shared data model for the settlement core.
//!
//! This crate defines the types both service crates operate on:
//! - Fixed-point money and product identifiers
//! - Accounts with salted-hash credentials and a status lifecycle
//! - Immutable ledger entries (deposit, withdrawal, transfer)
//! - Orders, frozen line items, and the order status machine

pub mod account;
pub mod credential;
pub mod entry;
pub mod money;
pub mod order;
pub mod product;
pub mod status;

pub use account::{Account, AccountClass, AccountId, AccountStatus};
pub use credential::Credential;
pub use entry::{EntryKind, EntryStatus, LedgerEntry, TransactionId};
pub use money::Money;
pub use order::{LineId, Order, OrderId, OrderLine, PaymentMethod, PaymentStatus};
pub use product::ProductId;
pub use status::OrderStatus;
