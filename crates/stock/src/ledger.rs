//! In-memory stock ledger with atomic reservation.

use std::collections::HashMap;
use std::sync::Arc;

use common::ProductId;
use tokio::sync::RwLock;

use crate::error::{Shortage, StockError};
use crate::product::Product;

/// An item to reserve or restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveItem {
    /// The product to reserve.
    pub product_id: ProductId,
    /// Quantity to reserve.
    pub quantity: u32,
}

impl ReserveItem {
    /// Creates a new reservation item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Atomic per-product stock counts.
///
/// `reserve` checks every item before mutating anything, so a shortage on any
/// item leaves every count untouched. Idempotence of `restore` is a caller
/// obligation: the ledger applies each call it receives.
#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl StockLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product record.
    pub async fn upsert_product(&self, product: Product) {
        self.products.write().await.insert(product.id.clone(), product);
    }

    /// Returns a snapshot of a product record.
    pub async fn product(&self, product_id: &ProductId) -> Option<Product> {
        self.products.read().await.get(product_id).cloned()
    }

    /// Returns the current stock count for a product.
    pub async fn stock_level(&self, product_id: &ProductId) -> Result<u32, StockError> {
        self.products
            .read()
            .await
            .get(product_id)
            .map(|p| p.stock)
            .ok_or_else(|| StockError::ProductNotFound(product_id.clone()))
    }

    /// Reserves stock for every item, all-or-nothing.
    ///
    /// If any item is short the call returns `StockError::Insufficient` with
    /// the full shortage list and no count is changed.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn reserve(&self, items: &[ReserveItem]) -> Result<(), StockError> {
        for item in items {
            if item.quantity == 0 {
                return Err(StockError::InvalidQuantity { quantity: 0 });
            }
        }

        let mut products = self.products.write().await;

        // Check phase: collect every shortage before touching any count.
        let mut shortages = Vec::new();
        for item in items {
            let available = match products.get(&item.product_id) {
                Some(product) => product.stock,
                None => return Err(StockError::ProductNotFound(item.product_id.clone())),
            };
            if available < item.quantity {
                shortages.push(Shortage {
                    product_id: item.product_id.clone(),
                    requested: item.quantity,
                    available,
                });
            }
        }

        if !shortages.is_empty() {
            metrics::counter!("stock_reserve_shortages_total").increment(1);
            tracing::warn!(shortages = shortages.len(), "reservation rejected");
            return Err(StockError::Insufficient(shortages));
        }

        // Apply phase: every item checked out, decrement as one unit.
        for item in items {
            if let Some(product) = products.get_mut(&item.product_id) {
                product.stock -= item.quantity;
            }
        }

        metrics::counter!("stock_reservations_total").increment(1);
        Ok(())
    }

    /// Restores stock for every item by its quantity.
    ///
    /// Always succeeds for known products; there is no upper bound check.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn restore(&self, items: &[ReserveItem]) -> Result<(), StockError> {
        let mut products = self.products.write().await;

        for item in items {
            if !products.contains_key(&item.product_id) {
                return Err(StockError::ProductNotFound(item.product_id.clone()));
            }
        }

        for item in items {
            if let Some(product) = products.get_mut(&item.product_id) {
                product.stock += item.quantity;
            }
        }

        metrics::counter!("stock_restorations_total").increment(1);
        Ok(())
    }

    /// Manual inventory top-up. The quantity must be positive.
    #[tracing::instrument(skip(self))]
    pub async fn add_stock(&self, product_id: &ProductId, quantity: u32) -> Result<u32, StockError> {
        if quantity == 0 {
            return Err(StockError::InvalidQuantity { quantity });
        }

        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StockError::ProductNotFound(product_id.clone()))?;

        product.stock += quantity;
        Ok(product.stock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    async fn ledger_with(products: &[(&str, u32)]) -> StockLedger {
        let ledger = StockLedger::new();
        for (sku, stock) in products {
            ledger
                .upsert_product(Product::new(*sku, *sku, Money::from_cents(1000), *stock))
                .await;
        }
        ledger
    }

    #[tokio::test]
    async fn reserve_decrements_every_item() {
        let ledger = ledger_with(&[("SKU-001", 5), ("SKU-002", 3)]).await;

        let items = vec![
            ReserveItem::new("SKU-001", 3),
            ReserveItem::new("SKU-002", 2),
        ];
        ledger.reserve(&items).await.unwrap();

        assert_eq!(ledger.stock_level(&"SKU-001".into()).await.unwrap(), 2);
        assert_eq!(ledger.stock_level(&"SKU-002".into()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reserve_is_all_or_nothing_on_shortage() {
        let ledger = ledger_with(&[("SKU-001", 5), ("SKU-002", 1)]).await;

        let items = vec![
            ReserveItem::new("SKU-001", 3),
            ReserveItem::new("SKU-002", 2),
        ];
        let err = ledger.reserve(&items).await.unwrap_err();

        match err {
            StockError::Insufficient(shortages) => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].product_id.as_str(), "SKU-002");
                assert_eq!(shortages[0].requested, 2);
                assert_eq!(shortages[0].available, 1);
            }
            other => panic!("expected Insufficient, got {other:?}"),
        }

        // Nothing was decremented, including the item that had enough stock.
        assert_eq!(ledger.stock_level(&"SKU-001".into()).await.unwrap(), 5);
        assert_eq!(ledger.stock_level(&"SKU-002".into()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reserve_reports_all_short_items() {
        let ledger = ledger_with(&[("SKU-001", 0), ("SKU-002", 1)]).await;

        let items = vec![
            ReserveItem::new("SKU-001", 1),
            ReserveItem::new("SKU-002", 4),
        ];
        let err = ledger.reserve(&items).await.unwrap_err();

        match err {
            StockError::Insufficient(shortages) => assert_eq!(shortages.len(), 2),
            other => panic!("expected Insufficient, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reserve_then_restore_round_trips() {
        let ledger = ledger_with(&[("SKU-001", 5), ("SKU-002", 3)]).await;
        let items = vec![
            ReserveItem::new("SKU-001", 2),
            ReserveItem::new("SKU-002", 3),
        ];

        ledger.reserve(&items).await.unwrap();
        ledger.restore(&items).await.unwrap();

        assert_eq!(ledger.stock_level(&"SKU-001".into()).await.unwrap(), 5);
        assert_eq!(ledger.stock_level(&"SKU-002".into()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reserve_unknown_product_fails() {
        let ledger = ledger_with(&[("SKU-001", 5)]).await;
        let items = vec![ReserveItem::new("SKU-404", 1)];

        let err = ledger.reserve(&items).await.unwrap_err();
        assert!(matches!(err, StockError::ProductNotFound(_)));
        assert_eq!(ledger.stock_level(&"SKU-001".into()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn reserve_zero_quantity_fails() {
        let ledger = ledger_with(&[("SKU-001", 5)]).await;
        let items = vec![ReserveItem::new("SKU-001", 0)];

        let err = ledger.reserve(&items).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidQuantity { .. }));
    }

    #[tokio::test]
    async fn restore_has_no_upper_bound() {
        let ledger = ledger_with(&[("SKU-001", 5)]).await;
        let items = vec![ReserveItem::new("SKU-001", 100)];

        ledger.restore(&items).await.unwrap();
        assert_eq!(ledger.stock_level(&"SKU-001".into()).await.unwrap(), 105);
    }

    #[tokio::test]
    async fn add_stock_tops_up() {
        let ledger = ledger_with(&[("SKU-001", 5)]).await;

        let new_level = ledger.add_stock(&"SKU-001".into(), 10).await.unwrap();
        assert_eq!(new_level, 15);
    }

    #[tokio::test]
    async fn add_stock_rejects_zero() {
        let ledger = ledger_with(&[("SKU-001", 5)]).await;

        let err = ledger.add_stock(&"SKU-001".into(), 0).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidQuantity { quantity: 0 }));
    }

    #[tokio::test]
    async fn concurrent_reserves_never_oversell() {
        let ledger = ledger_with(&[("SKU-001", 10)]).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.reserve(&[ReserveItem::new("SKU-001", 1)]).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 10);
        assert_eq!(ledger.stock_level(&"SKU-001".into()).await.unwrap(), 0);
    }
}
