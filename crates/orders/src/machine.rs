//! Order lifecycle state machine.
//!
//! Validates and applies transitions along the canonical graph, invoking
//! the stock ledger at the edges that require it. The status write, the
//! stock side effect, and the audit entry all happen inside one critical
//! section under the order store's write lock; notifications are emitted
//! after the lock is released.

use chrono::Utc;
use common::{Actor, CameraId, ChangedBy, CustomerId, OrderId, Position};
use stock::StockLedger;

use crate::audit::{AuditLog, StatusLogEntry};
use crate::error::FulfillmentError;
use crate::notify::{NotificationSink, StatusChanged};
use crate::order::{Order, OrderItem};
use crate::policy::FulfillmentPolicy;
use crate::status::OrderStatus;
use crate::store::OrderStore;

/// Applies lifecycle transitions to orders.
pub struct OrderStateMachine<N: NotificationSink> {
    store: OrderStore,
    ledger: StockLedger,
    audit: AuditLog,
    notifier: N,
    policy: FulfillmentPolicy,
}

impl<N: NotificationSink> OrderStateMachine<N> {
    /// Creates a state machine with the canonical policy.
    pub fn new(store: OrderStore, ledger: StockLedger, notifier: N) -> Self {
        Self::with_policy(store, ledger, notifier, FulfillmentPolicy::default())
    }

    /// Creates a state machine with an explicit policy.
    pub fn with_policy(
        store: OrderStore,
        ledger: StockLedger,
        notifier: N,
        policy: FulfillmentPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            audit: AuditLog::new(),
            notifier,
            policy,
        }
    }

    /// Returns the order store.
    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    /// Returns the audit log.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Returns the stock ledger.
    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    /// Returns the active policy.
    pub fn policy(&self) -> &FulfillmentPolicy {
        &self.policy
    }

    /// Creates a new pending order for a customer.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_order(
        &self,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
    ) -> Result<Order, FulfillmentError> {
        let order = Order::create(customer_id, items)?;
        let snapshot = order.clone();
        self.store.insert(order).await;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %snapshot.id, total = %snapshot.total, "order created");
        Ok(snapshot)
    }

    /// Loads an order by ID.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, FulfillmentError> {
        self.store
            .get(order_id)
            .await
            .ok_or(FulfillmentError::NotFound(order_id))
    }

    /// Moves an order along one edge of the transition graph.
    ///
    /// Preconditions are checked atomically with the status write: the edge
    /// must exist, the actor must be authorized for it, and any stock effect
    /// must succeed. On failure nothing is mutated and the error names the
    /// cause (illegal edge, unauthorized actor, or shortage detail).
    #[tracing::instrument(skip(self, actor, reason), fields(actor_id = %actor.id))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        actor: &Actor,
        target: OrderStatus,
        reason: Option<String>,
    ) -> Result<Order, FulfillmentError> {
        let result = self.apply_transition(order_id, actor, target, reason).await;
        match &result {
            Ok(order) => {
                metrics::counter!("order_transitions_total", "to" => target.as_str()).increment(1);
                tracing::info!(%order_id, status = %order.status, "order transitioned");
            }
            Err(e) => {
                // Failed attempts are not persisted to the audit log, but
                // every one of them leaves a trace here.
                metrics::counter!("order_transitions_failed_total").increment(1);
                tracing::warn!(%order_id, target = %target, error = %e, "transition rejected");
            }
        }
        result
    }

    async fn apply_transition(
        &self,
        order_id: OrderId,
        actor: &Actor,
        target: OrderStatus,
        reason: Option<String>,
    ) -> Result<Order, FulfillmentError> {
        use OrderStatus::*;

        let (snapshot, old_status, bounced) = {
            let mut orders = self.store.lock().await;
            let order = orders
                .get_mut(&order_id)
                .ok_or(FulfillmentError::NotFound(order_id))?;
            let from = order.status;

            if !from.has_edge_to(target) {
                return Err(FulfillmentError::IllegalTransition { from, to: target });
            }

            let mut bounced = false;
            match (from, target) {
                (Packing, Verifying) => {
                    return Err(FulfillmentError::ClaimRequired { order_id });
                }
                (Pending, Confirmed) => {
                    require(actor, Position::PreparationStaff, "confirm order")?;
                }
                (Confirmed, Cancelled) => {
                    require(actor, Position::PreparationStaff, "cancel order")?;
                }
                (Confirmed, Packing) => {
                    require(actor, Position::PreparationStaff, "approve for packing")?;
                    // Shortage aborts the transition with the order untouched.
                    self.ledger.reserve(&order.reserve_items()).await?;
                }
                (Verifying, Completed) => {
                    require(actor, Position::PackingStaff, "complete verification")?;
                }
                (Verifying, to) if to == self.policy.bounce_target => {
                    require(actor, Position::PackingStaff, "fail verification")?;
                    self.ledger.restore(&order.reserve_items()).await?;
                    bounced = true;
                }
                (Completed, Packing) => {
                    require(actor, Position::Admin, "revert completed order")?;
                    if reason.is_none() {
                        return Err(FulfillmentError::ReasonRequired { order_id });
                    }
                }
                // The non-policy bounce target is an edge of the graph but
                // not of this deployment.
                (from, to) => {
                    return Err(FulfillmentError::IllegalTransition { from, to });
                }
            }

            order.status = target;
            order.updated_at = Utc::now();
            match target {
                Completed => {
                    order.is_verified = true;
                    order.assigned_staff = None;
                }
                Packing if from == Completed => {
                    // Revert does not touch stock: items were reserved and
                    // never restored. The order must be verified again.
                    order.is_verified = false;
                }
                _ => {}
            }
            if bounced && self.policy.clear_assignee_on_bounce {
                order.assigned_staff = None;
            }

            self.audit
                .append(StatusLogEntry {
                    order_id,
                    old_status: from,
                    new_status: target,
                    reason: reason.clone(),
                    changed_by: ChangedBy::Staff(actor.id),
                    created_at: order.updated_at,
                })
                .await;

            (order.clone(), from, bounced)
        };

        // Lock released; delivery is best-effort and never affects the
        // committed transition.
        self.notifier
            .status_changed(StatusChanged {
                order_id,
                old_status,
                new_status: target,
                reason: reason.clone(),
                changed_by: ChangedBy::Staff(actor.id),
                timestamp: snapshot.updated_at,
            })
            .await;
        if bounced {
            self.notifier.order_bounced(order_id, reason).await;
        }

        Ok(snapshot)
    }

    /// Assigns `staff` to the order and walks the `packing -> verifying`
    /// edge. Called only by the assignment coordinator, inside one critical
    /// section.
    pub(crate) async fn claim_into_verification(
        &self,
        order_id: OrderId,
        staff: &Actor,
        camera_id: Option<CameraId>,
    ) -> Result<Order, FulfillmentError> {
        require(staff, Position::PackingStaff, "claim order")?;

        let (snapshot, old_status, status_changed) = {
            let mut orders = self.store.lock().await;
            let order = orders
                .get_mut(&order_id)
                .ok_or(FulfillmentError::NotFound(order_id))?;

            if let Some(assigned_to) = order.assigned_staff {
                return Err(FulfillmentError::AlreadyAssigned {
                    order_id,
                    assigned_to,
                });
            }
            if !self.policy.is_claimable(order.status) {
                return Err(FulfillmentError::InvalidState {
                    order_id,
                    status: order.status,
                });
            }

            let from = order.status;
            order.assigned_staff = Some(staff.id);
            if camera_id.is_some() {
                order.camera_id = camera_id;
            }
            order.updated_at = Utc::now();

            // A policy-widened claim from a pre-packing status only assigns
            // the staff member; the verifying edge still requires packing.
            let status_changed = from == OrderStatus::Packing;
            if status_changed {
                order.status = OrderStatus::Verifying;
                self.audit
                    .append(StatusLogEntry {
                        order_id,
                        old_status: from,
                        new_status: OrderStatus::Verifying,
                        reason: None,
                        changed_by: ChangedBy::Staff(staff.id),
                        created_at: order.updated_at,
                    })
                    .await;
            }

            (order.clone(), from, status_changed)
        };

        if status_changed {
            self.notifier
                .status_changed(StatusChanged {
                    order_id,
                    old_status,
                    new_status: OrderStatus::Verifying,
                    reason: None,
                    changed_by: ChangedBy::Staff(staff.id),
                    timestamp: snapshot.updated_at,
                })
                .await;
        }

        Ok(snapshot)
    }

    /// Stores the write-once evidence image reference for an order.
    #[tracing::instrument(skip(self, path))]
    pub async fn attach_evidence(
        &self,
        order_id: OrderId,
        path: impl Into<String>,
    ) -> Result<Order, FulfillmentError> {
        let mut orders = self.store.lock().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(FulfillmentError::NotFound(order_id))?;

        if order.evidence_image.is_some() {
            return Err(FulfillmentError::EvidenceAttached(order_id));
        }

        order.evidence_image = Some(path.into());
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

fn require(actor: &Actor, position: Position, action: &'static str) -> Result<(), FulfillmentError> {
    if actor.holds_position(position) {
        Ok(())
    } else {
        Err(FulfillmentError::Unauthorized {
            action,
            required: position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotificationSink;
    use common::Money;
    use stock::Product;

    fn prep() -> Actor {
        Actor::employee(common::StaffId::new(), Position::PreparationStaff)
    }

    fn packer() -> Actor {
        Actor::employee(common::StaffId::new(), Position::PackingStaff)
    }

    fn admin() -> Actor {
        Actor::employee(common::StaffId::new(), Position::Admin)
    }

    async fn machine() -> OrderStateMachine<RecordingNotificationSink> {
        let ledger = StockLedger::new();
        ledger
            .upsert_product(Product::new("SKU-001", "Widget", Money::from_cents(1000), 5))
            .await;
        ledger
            .upsert_product(Product::new("SKU-002", "Gadget", Money::from_cents(500), 1))
            .await;
        OrderStateMachine::new(OrderStore::new(), ledger, RecordingNotificationSink::new())
    }

    async fn new_order(machine: &OrderStateMachine<RecordingNotificationSink>) -> Order {
        machine
            .create_order(
                CustomerId::new(),
                vec![OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(1000))],
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn confirm_requires_preparation_staff() {
        let machine = machine().await;
        let order = new_order(&machine).await;

        let err = machine
            .transition(order.id, &packer(), OrderStatus::Confirmed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Unauthorized { .. }));

        let order = machine
            .transition(order.id, &prep(), OrderStatus::Confirmed, None)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn approve_for_packing_reserves_stock() {
        let machine = machine().await;
        let order = new_order(&machine).await;
        let prep = prep();

        machine
            .transition(order.id, &prep, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        machine
            .transition(order.id, &prep, OrderStatus::Packing, None)
            .await
            .unwrap();

        let level = machine.ledger().stock_level(&"SKU-001".into()).await.unwrap();
        assert_eq!(level, 3);
    }

    #[tokio::test]
    async fn shortage_aborts_approval_entirely() {
        let machine = machine().await;
        let prep = prep();
        let order = machine
            .create_order(
                CustomerId::new(),
                vec![
                    OrderItem::new("SKU-001", "Widget", 3, Money::from_cents(1000)),
                    OrderItem::new("SKU-002", "Gadget", 2, Money::from_cents(500)),
                ],
            )
            .await
            .unwrap();
        machine
            .transition(order.id, &prep, OrderStatus::Confirmed, None)
            .await
            .unwrap();

        let err = machine
            .transition(order.id, &prep, OrderStatus::Packing, None)
            .await
            .unwrap_err();

        match err {
            FulfillmentError::InsufficientStock(shortages) => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].product_id.as_str(), "SKU-002");
                assert_eq!(shortages[0].requested, 2);
                assert_eq!(shortages[0].available, 1);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // No mutation: stock intact, status still confirmed.
        assert_eq!(
            machine.ledger().stock_level(&"SKU-001".into()).await.unwrap(),
            5
        );
        assert_eq!(
            machine.ledger().stock_level(&"SKU-002".into()).await.unwrap(),
            1
        );
        let order = machine.get_order(order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn illegal_edge_is_rejected() {
        let machine = machine().await;
        let order = new_order(&machine).await;

        let err = machine
            .transition(order.id, &prep(), OrderStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::IllegalTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Completed
            }
        ));
    }

    #[tokio::test]
    async fn verifying_edge_requires_claim() {
        let machine = machine().await;
        let order = new_order(&machine).await;
        let prep = prep();

        machine
            .transition(order.id, &prep, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        machine
            .transition(order.id, &prep, OrderStatus::Packing, None)
            .await
            .unwrap();

        let err = machine
            .transition(order.id, &packer(), OrderStatus::Verifying, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::ClaimRequired { .. }));
    }

    #[tokio::test]
    async fn completion_sets_verified_and_clears_assignee() {
        let machine = machine().await;
        let order = new_order(&machine).await;
        let prep = prep();
        let packer = packer();

        machine
            .transition(order.id, &prep, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        machine
            .transition(order.id, &prep, OrderStatus::Packing, None)
            .await
            .unwrap();
        machine
            .claim_into_verification(order.id, &packer, None)
            .await
            .unwrap();

        let order = machine
            .transition(order.id, &packer, OrderStatus::Completed, None)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.is_verified);
        assert!(order.assigned_staff.is_none());
    }

    #[tokio::test]
    async fn failed_verification_bounces_restores_and_clears() {
        let machine = machine().await;
        let order = new_order(&machine).await;
        let prep = prep();
        let packer = packer();

        machine
            .transition(order.id, &prep, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        machine
            .transition(order.id, &prep, OrderStatus::Packing, None)
            .await
            .unwrap();
        machine
            .claim_into_verification(order.id, &packer, None)
            .await
            .unwrap();
        assert_eq!(
            machine.ledger().stock_level(&"SKU-001".into()).await.unwrap(),
            3
        );

        let order = machine
            .transition(
                order.id,
                &packer,
                OrderStatus::Confirmed,
                Some("one widget missing".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.assigned_staff.is_none());
        assert_eq!(
            machine.ledger().stock_level(&"SKU-001".into()).await.unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn admin_revert_requires_reason() {
        let machine = machine().await;
        let order = new_order(&machine).await;
        let prep = prep();
        let packer = packer();
        let admin = admin();

        machine
            .transition(order.id, &prep, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        machine
            .transition(order.id, &prep, OrderStatus::Packing, None)
            .await
            .unwrap();
        machine
            .claim_into_verification(order.id, &packer, None)
            .await
            .unwrap();
        machine
            .transition(order.id, &packer, OrderStatus::Completed, None)
            .await
            .unwrap();

        let err = machine
            .transition(order.id, &admin, OrderStatus::Packing, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::ReasonRequired { .. }));

        let order = machine
            .transition(
                order.id,
                &admin,
                OrderStatus::Packing,
                Some("audit found wrong item".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Packing);
        assert!(!order.is_verified);

        // Revert never touches stock.
        assert_eq!(
            machine.ledger().stock_level(&"SKU-001".into()).await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn inactive_actor_is_rejected() {
        let machine = machine().await;
        let order = new_order(&machine).await;
        let mut actor = prep();
        actor.is_active = false;

        let err = machine
            .transition(order.id, &actor, OrderStatus::Confirmed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let machine = machine().await;
        let err = machine
            .transition(OrderId::new(), &prep(), OrderStatus::Confirmed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound(_)));
    }

    #[tokio::test]
    async fn evidence_image_is_write_once() {
        let machine = machine().await;
        let order = new_order(&machine).await;

        let order = machine
            .attach_evidence(order.id, "uploads/packing/42.jpg")
            .await
            .unwrap();
        assert_eq!(order.evidence_image.as_deref(), Some("uploads/packing/42.jpg"));

        let err = machine
            .attach_evidence(order.id, "uploads/packing/other.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::EvidenceAttached(_)));
    }

    #[tokio::test]
    async fn pending_bounce_policy_is_honored() {
        let ledger = StockLedger::new();
        ledger
            .upsert_product(Product::new("SKU-001", "Widget", Money::from_cents(1000), 5))
            .await;
        let policy = FulfillmentPolicy {
            bounce_target: OrderStatus::Pending,
            ..FulfillmentPolicy::default()
        };
        let machine = OrderStateMachine::with_policy(
            OrderStore::new(),
            ledger,
            RecordingNotificationSink::new(),
            policy,
        );
        let order = new_order(&machine).await;
        let prep = prep();
        let packer = packer();

        machine
            .transition(order.id, &prep, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        machine
            .transition(order.id, &prep, OrderStatus::Packing, None)
            .await
            .unwrap();
        machine
            .claim_into_verification(order.id, &packer, None)
            .await
            .unwrap();

        // The canonical bounce target is rejected under this policy.
        let err = machine
            .transition(order.id, &packer, OrderStatus::Confirmed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::IllegalTransition { .. }));

        let order = machine
            .transition(order.id, &packer, OrderStatus::Pending, None)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
