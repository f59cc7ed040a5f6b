//! Gateway traits to the cart and inventory collaborators, with
//! in-memory implementations for tests and wiring.

pub mod cart;
pub mod inventory;

pub use cart::{CartGateway, CartItemId, CartLine, InMemoryCartGateway};
pub use inventory::{InMemoryInventoryGateway, InventoryGateway};
