//! Product record held by the stock ledger.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A product as the ledger sees it.
///
/// The ledger owns the `stock` field; descriptive metadata belongs to the
/// catalog collaborator and is carried here only for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier (SKU).
    pub id: ProductId,
    /// Human-readable product name.
    pub name: String,
    /// Current unit price.
    pub price: Money,
    /// Units on hand. Never negative.
    pub stock: u32,
}

impl Product {
    /// Creates a new product record.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
        }
    }
}
