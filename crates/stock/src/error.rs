//! Stock ledger error types.

use common::ProductId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single per-item shortage detected during reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    /// The product that could not be reserved.
    pub product_id: ProductId,
    /// Quantity the order asked for.
    pub requested: u32,
    /// Quantity actually available.
    pub available: u32,
}

impl std::fmt::Display for Shortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: requested {}, available {}",
            self.product_id, self.requested, self.available
        )
    }
}

/// Errors that can occur during stock operations.
#[derive(Debug, Error)]
pub enum StockError {
    /// One or more items could not be covered by current stock.
    ///
    /// Carries every short item, never a partial list.
    #[error("insufficient stock: {}", format_shortages(.0))]
    Insufficient(Vec<Shortage>),

    /// The product is not known to the ledger.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// A quantity was zero or otherwise unusable.
    #[error("invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },
}

fn format_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
