//! Shared types used across the settlement core crates.

pub mod types;

pub use types::ActorId;
