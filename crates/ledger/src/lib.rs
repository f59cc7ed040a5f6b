//! Ledger service for the settlement core.
//!
//! Exposes the monetary primitives the rest of the system builds on:
//! account opening, deposit, withdrawal, transfer, compensation refund,
//! and the read-only history and account projections. Every balance
//! change is validated here and applied atomically with exactly one
//! ledger entry.

pub mod error;
pub mod service;

pub use error::{LedgerError, Result};
pub use service::LedgerService;
