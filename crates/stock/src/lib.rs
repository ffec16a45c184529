//! Stock ledger for the fulfillment core.
//!
//! Provides atomic reservation and restoration of per-product stock counts.
//! Reservation is all-or-nothing: either every requested item is decremented
//! or nothing changes and the caller receives the full shortage list.

pub mod error;
pub mod ledger;
pub mod product;

pub use error::{Shortage, StockError};
pub use ledger::{ReserveItem, StockLedger};
pub use product::Product;

/// Convenience type alias for stock results.
pub type Result<T> = std::result::Result<T, StockError>;
