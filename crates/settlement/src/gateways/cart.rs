//! Cart gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::ActorId;
use domain::ProductId;
use uuid::Uuid;

use crate::error::SettlementError;

/// Unique identifier for a line sitting in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CartItemId(Uuid);

impl CartItemId {
    /// Creates a new random cart item ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a cart item ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CartItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CartItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One line of a cart as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Cart line identifier, used to clear consumed lines later.
    pub id: CartItemId,

    /// Product in the cart.
    pub product_id: ProductId,

    /// Quantity requested.
    pub quantity: u32,
}

/// Trait for the cart collaborator.
///
/// The cart itself (add/remove/update) is owned elsewhere; settlement
/// only snapshots lines and clears the ones an order consumed.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Returns the owner's cart lines, optionally restricted to an
    /// explicit set of cart item IDs.
    async fn resolve_lines(
        &self,
        owner: ActorId,
        explicit: Option<&[CartItemId]>,
    ) -> Result<Vec<CartLine>, SettlementError>;

    /// Removes the consumed lines from the owner's cart.
    async fn clear(&self, owner: ActorId, consumed: &[CartItemId]) -> Result<(), SettlementError>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<ActorId, Vec<CartLine>>,
    fail_on_clear: bool,
}

/// In-memory cart gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartGateway {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartGateway {
    /// Creates a new empty in-memory cart gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts a line into an owner's cart and returns its ID.
    pub fn add_item(
        &self,
        owner: ActorId,
        product_id: impl Into<ProductId>,
        quantity: u32,
    ) -> CartItemId {
        let line = CartLine {
            id: CartItemId::new(),
            product_id: product_id.into(),
            quantity,
        };
        let id = line.id;
        self.state
            .write()
            .unwrap()
            .carts
            .entry(owner)
            .or_default()
            .push(line);
        id
    }

    /// Makes every subsequent `clear` call fail, for failure-path tests.
    pub fn set_fail_on_clear(&self, fail: bool) {
        self.state.write().unwrap().fail_on_clear = fail;
    }

    /// Returns the number of lines left in an owner's cart.
    pub fn line_count(&self, owner: ActorId) -> usize {
        self.state
            .read()
            .unwrap()
            .carts
            .get(&owner)
            .map_or(0, |lines| lines.len())
    }
}

#[async_trait]
impl CartGateway for InMemoryCartGateway {
    async fn resolve_lines(
        &self,
        owner: ActorId,
        explicit: Option<&[CartItemId]>,
    ) -> Result<Vec<CartLine>, SettlementError> {
        let state = self.state.read().unwrap();
        let lines = state.carts.get(&owner).cloned().unwrap_or_default();

        Ok(match explicit {
            Some(ids) => lines
                .into_iter()
                .filter(|line| ids.contains(&line.id))
                .collect(),
            None => lines,
        })
    }

    async fn clear(&self, owner: ActorId, consumed: &[CartItemId]) -> Result<(), SettlementError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_clear {
            return Err(SettlementError::Cart("cart service unavailable".to_string()));
        }
        if let Some(lines) = state.carts.get_mut(&owner) {
            lines.retain(|line| !consumed.contains(&line.id));
        }
        Ok(())
    }
}
