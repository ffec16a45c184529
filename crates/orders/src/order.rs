//! Order record and items.

use chrono::{DateTime, Utc};
use common::{CameraId, CustomerId, Money, OrderId, ProductId, StaffId};
use serde::{Deserialize, Serialize};
use stock::ReserveItem;

use crate::error::FulfillmentError;
use crate::status::OrderStatus;

/// A line item on an order.
///
/// The unit price is a snapshot taken at order time; later catalog price
/// changes do not touch it. Items are immutable after creation — the
/// reservation flow only reads quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Human-readable product name.
    pub product_name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit at order time.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the line total (quantity * unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order moving through the fulfillment lifecycle.
///
/// Mutated only through [`OrderStateMachine`](crate::machine::OrderStateMachine)
/// and [`AssignmentCoordinator`](crate::coordinator::AssignmentCoordinator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,

    /// Customer who placed the order.
    pub customer_id: CustomerId,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// The staff member currently working the order, if any.
    pub assigned_staff: Option<StaffId>,

    /// Camera bound to the order for packing verification, if any.
    pub camera_id: Option<CameraId>,

    /// Line items, fixed at creation.
    pub items: Vec<OrderItem>,

    /// Order total, computed from the line items at creation.
    pub total: Money,

    /// Set when the packer affirms all items present.
    pub is_verified: bool,

    /// Write-once reference to the evidence image blob.
    pub evidence_image: Option<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order after validating its items.
    pub fn create(customer_id: CustomerId, items: Vec<OrderItem>) -> Result<Self, FulfillmentError> {
        if items.is_empty() {
            return Err(FulfillmentError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }

        for item in &items {
            if item.quantity == 0 {
                return Err(FulfillmentError::Validation(format!(
                    "item {} has zero quantity",
                    item.product_id
                )));
            }
            if !item.unit_price.is_positive() {
                return Err(FulfillmentError::Validation(format!(
                    "item {} has a non-positive price",
                    item.product_id
                )));
            }
        }

        let total = items
            .iter()
            .fold(Money::zero(), |acc, item| acc + item.line_total());
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            customer_id,
            status: OrderStatus::Pending,
            assigned_staff: None,
            camera_id: None,
            items,
            total,
            is_verified: false,
            evidence_image: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the items as ledger reservation entries.
    pub fn reserve_items(&self) -> Vec<ReserveItem> {
        self.items
            .iter()
            .map(|item| ReserveItem::new(item.product_id.clone(), item.quantity))
            .collect()
    }
}
