//! Inventory gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, ProductId};

use crate::error::SettlementError;

/// Trait for the catalog/inventory collaborator.
///
/// `check_available` is the cheap early check used at order creation;
/// `commit` is the authoritative decrement at payment time and the only
/// call that actually takes stock. The two are deliberately separate,
/// so stock can vanish between them; the payment path compensates when
/// that happens.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Returns true if at least `quantity` units are currently available.
    async fn check_available(
        &self,
        product: &ProductId,
        quantity: u32,
    ) -> Result<bool, SettlementError>;

    /// Decrements available stock by `quantity`.
    ///
    /// Returns false when stock cannot cover the quantity; nothing is
    /// taken in that case.
    async fn commit(&self, product: &ProductId, quantity: u32) -> Result<bool, SettlementError>;

    /// Returns previously committed stock, undoing a `commit`.
    async fn release(&self, product: &ProductId, quantity: u32) -> Result<(), SettlementError>;

    /// Current catalog price of a product.
    async fn price_of(&self, product: &ProductId) -> Result<Money, SettlementError>;

    /// Display name of a product, when the catalog still knows it.
    async fn name_of(&self, product: &ProductId) -> Result<Option<String>, SettlementError>;
}

#[derive(Debug, Clone)]
struct ProductRecord {
    name: String,
    price: Money,
    available: u32,
    committed: u32,
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: HashMap<ProductId, ProductRecord>,
    fail_on_commit: Option<ProductId>,
}

/// In-memory inventory gateway for testing.
///
/// Supports stock and price seeding, committed-quantity inspection, and
/// failure injection for the compensation path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryGateway {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryGateway {
    /// Creates a new empty in-memory inventory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a product with a name, price, and available stock.
    pub fn stock_product(
        &self,
        product: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        available: u32,
    ) {
        self.state.write().unwrap().products.insert(
            product.into(),
            ProductRecord {
                name: name.into(),
                price,
                available,
                committed: 0,
            },
        );
    }

    /// Changes a product's catalog price.
    pub fn set_price(&self, product: &ProductId, price: Money) {
        if let Some(record) = self.state.write().unwrap().products.get_mut(product) {
            record.price = price;
        }
    }

    /// Overwrites a product's available stock.
    pub fn set_available(&self, product: &ProductId, available: u32) {
        if let Some(record) = self.state.write().unwrap().products.get_mut(product) {
            record.available = available;
        }
    }

    /// Forces the next `commit` calls for a product to report no stock.
    pub fn set_fail_on_commit(&self, product: Option<ProductId>) {
        self.state.write().unwrap().fail_on_commit = product;
    }

    /// Returns a product's currently available stock.
    pub fn available(&self, product: &ProductId) -> u32 {
        self.state
            .read()
            .unwrap()
            .products
            .get(product)
            .map_or(0, |r| r.available)
    }

    /// Returns how many units of a product have been committed.
    pub fn committed(&self, product: &ProductId) -> u32 {
        self.state
            .read()
            .unwrap()
            .products
            .get(product)
            .map_or(0, |r| r.committed)
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventoryGateway {
    async fn check_available(
        &self,
        product: &ProductId,
        quantity: u32,
    ) -> Result<bool, SettlementError> {
        let state = self.state.read().unwrap();
        Ok(state
            .products
            .get(product)
            .is_some_and(|r| r.available >= quantity))
    }

    async fn commit(&self, product: &ProductId, quantity: u32) -> Result<bool, SettlementError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_commit.as_ref() == Some(product) {
            return Ok(false);
        }

        match state.products.get_mut(product) {
            Some(record) if record.available >= quantity => {
                record.available -= quantity;
                record.committed += quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, product: &ProductId, quantity: u32) -> Result<(), SettlementError> {
        let mut state = self.state.write().unwrap();
        if let Some(record) = state.products.get_mut(product) {
            let returned = quantity.min(record.committed);
            record.committed -= returned;
            record.available += returned;
        }
        Ok(())
    }

    async fn price_of(&self, product: &ProductId) -> Result<Money, SettlementError> {
        let state = self.state.read().unwrap();
        state
            .products
            .get(product)
            .map(|r| r.price)
            .ok_or_else(|| SettlementError::Inventory(format!("unknown product: {product}")))
    }

    async fn name_of(&self, product: &ProductId) -> Result<Option<String>, SettlementError> {
        let state = self.state.read().unwrap();
        Ok(state.products.get(product).map(|r| r.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (InMemoryInventoryGateway, ProductId) {
        let gateway = InMemoryInventoryGateway::new();
        let product = ProductId::new("SKU-001");
        gateway.stock_product(product.clone(), "Widget", Money::from_cents(2000), 5);
        (gateway, product)
    }

    #[tokio::test]
    async fn test_check_available() {
        let (gateway, product) = seeded();
        assert!(gateway.check_available(&product, 5).await.unwrap());
        assert!(!gateway.check_available(&product, 6).await.unwrap());
        assert!(
            !gateway
                .check_available(&ProductId::new("SKU-MISSING"), 1)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_commit_and_release_roundtrip() {
        let (gateway, product) = seeded();

        assert!(gateway.commit(&product, 3).await.unwrap());
        assert_eq!(gateway.available(&product), 2);
        assert_eq!(gateway.committed(&product), 3);

        gateway.release(&product, 3).await.unwrap();
        assert_eq!(gateway.available(&product), 5);
        assert_eq!(gateway.committed(&product), 0);
    }

    #[tokio::test]
    async fn test_commit_short_stock_takes_nothing() {
        let (gateway, product) = seeded();

        assert!(!gateway.commit(&product, 6).await.unwrap());
        assert_eq!(gateway.available(&product), 5);
        assert_eq!(gateway.committed(&product), 0);
    }

    #[tokio::test]
    async fn test_fail_on_commit_injection() {
        let (gateway, product) = seeded();
        gateway.set_fail_on_commit(Some(product.clone()));

        assert!(!gateway.commit(&product, 1).await.unwrap());
        assert_eq!(gateway.available(&product), 5);

        gateway.set_fail_on_commit(None);
        assert!(gateway.commit(&product, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_price_of_unknown_product_errors() {
        let (gateway, _) = seeded();
        let result = gateway.price_of(&ProductId::new("SKU-MISSING")).await;
        assert!(matches!(result, Err(SettlementError::Inventory(_))));
    }

    #[tokio::test]
    async fn test_name_of_falls_back_to_none() {
        let (gateway, product) = seeded();
        assert_eq!(
            gateway.name_of(&product).await.unwrap(),
            Some("Widget".to_string())
        );
        assert_eq!(
            gateway.name_of(&ProductId::new("SKU-MISSING")).await.unwrap(),
            None
        );
    }
}
