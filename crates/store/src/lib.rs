//! Persistence layer for the settlement core.
//!
//! Three narrow storage traits cover the two service crates:
//! - [`LedgerStore`] — accounts, guarded balance mutations, append-only entries
//! - [`OrderStore`] — orders, frozen lines, guarded status transitions
//! - [`CompensationStore`] — durable pending-compensation records
//!
//! Two implementations exist with identical semantics: [`InMemoryStore`]
//! for tests and wiring, and [`PostgresStore`] backed by sqlx.

pub mod compensation;
pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod orders;
pub mod postgres;

pub use compensation::{CompensationId, CompensationStore, PendingCompensation};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use ledger::{BalanceMutation, EntryStream, LedgerStore, validate_transaction};
pub use memory::InMemoryStore;
pub use orders::{OrderStore, PaymentUpdate, StatusTransition};
pub use postgres::PostgresStore;
