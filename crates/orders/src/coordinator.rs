//! Assignment coordinator.
//!
//! Guarantees at-most-one staff member is ever the active worker on a
//! given order. The claim runs as one short critical section under the
//! order store's exclusive lock; the lock is never held across inference
//! or notification calls.

use std::sync::Arc;

use common::{Actor, CameraId, OrderId};

use crate::error::FulfillmentError;
use crate::machine::OrderStateMachine;
use crate::notify::NotificationSink;
use crate::order::Order;

/// Coordinates exclusive claims on orders.
pub struct AssignmentCoordinator<N: NotificationSink> {
    machine: Arc<OrderStateMachine<N>>,
}

impl<N: NotificationSink> AssignmentCoordinator<N> {
    /// Creates a coordinator driving the given state machine.
    pub fn new(machine: Arc<OrderStateMachine<N>>) -> Self {
        Self { machine }
    }

    /// Claims an order for a packing staff member.
    ///
    /// Under concurrent attempts on the same order exactly one caller wins;
    /// the rest receive [`FulfillmentError::AlreadyAssigned`] or
    /// [`FulfillmentError::InvalidState`]. On success the order is assigned
    /// to the caller and has moved into `verifying`.
    #[tracing::instrument(skip(self, staff), fields(staff_id = %staff.id))]
    pub async fn claim(&self, order_id: OrderId, staff: &Actor) -> Result<Order, FulfillmentError> {
        self.claim_with_camera(order_id, staff, None).await
    }

    /// Claims an order and binds the packing station's camera to it.
    #[tracing::instrument(skip(self, staff), fields(staff_id = %staff.id))]
    pub async fn claim_with_camera(
        &self,
        order_id: OrderId,
        staff: &Actor,
        camera_id: Option<CameraId>,
    ) -> Result<Order, FulfillmentError> {
        let result = self
            .machine
            .claim_into_verification(order_id, staff, camera_id)
            .await;

        match &result {
            Ok(order) => {
                metrics::counter!("order_claims_total").increment(1);
                tracing::info!(%order_id, status = %order.status, "order claimed");
            }
            Err(e) => {
                metrics::counter!("order_claims_rejected_total").increment(1);
                tracing::debug!(%order_id, error = %e, "claim rejected");
            }
        }
        result
    }
}
