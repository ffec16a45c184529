//! Fulfillment error types.

use common::{OrderId, Position, StaffId};
use stock::{Shortage, StockError};
use thiserror::Error;

use crate::status::OrderStatus;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The actor's role or position does not authorize the attempted action.
    #[error("not authorized: {action} requires {required}")]
    Unauthorized {
        action: &'static str,
        required: Position,
    },

    /// The requested status change is not an edge of the transition graph.
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    /// `packing -> verifying` is walked only by the assignment coordinator.
    #[error("order {order_id} must be claimed to enter verification")]
    ClaimRequired { order_id: OrderId },

    /// Another staff member already claimed the order.
    #[error("order {order_id} is already assigned to {assigned_to}")]
    AlreadyAssigned {
        order_id: OrderId,
        assigned_to: StaffId,
    },

    /// The order is not in a claimable status.
    #[error("order {order_id} is not claimable in {status} status")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// The admin revert requires a reason.
    #[error("a reason is required to revert order {order_id}")]
    ReasonRequired { order_id: OrderId },

    /// Stock could not cover the order's items; carries the full shortage list.
    #[error("insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<Shortage>),

    /// The evidence image reference is write-once.
    #[error("evidence image already attached to order {0}")]
    EvidenceAttached(OrderId),

    /// Order not found.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// Non-shortage stock ledger failure.
    #[error("stock ledger error: {0}")]
    Stock(StockError),
}

impl From<StockError> for FulfillmentError {
    fn from(e: StockError) -> Self {
        match e {
            // Forward the shortage detail unchanged; callers rely on the
            // per-item list being complete.
            StockError::Insufficient(shortages) => FulfillmentError::InsufficientStock(shortages),
            other => FulfillmentError::Stock(other),
        }
    }
}
