//! Fire-and-forget notification interface.
//!
//! The notification collaborator receives an event on every successful
//! transition and a dedicated event when an order bounces back for
//! re-preparation. Delivery is best-effort: the state machine emits after
//! its critical section ends and never lets sink behavior affect the
//! outcome of a transition.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ChangedBy, OrderId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::status::OrderStatus;

/// Event emitted on every successful status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub order_id: OrderId,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub reason: Option<String>,
    pub changed_by: ChangedBy,
    pub timestamp: DateTime<Utc>,
}

/// Outbound notification seam.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Called after every successful transition.
    async fn status_changed(&self, event: StatusChanged);

    /// Called when an order is bounced back for re-preparation.
    async fn order_bounced(&self, order_id: OrderId, reason: Option<String>);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn status_changed(&self, _event: StatusChanged) {}

    async fn order_bounced(&self, _order_id: OrderId, _reason: Option<String>) {}
}

/// In-memory sink that records every event, for testing.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationSink {
    status_changes: Arc<RwLock<Vec<StatusChanged>>>,
    bounces: Arc<RwLock<Vec<(OrderId, Option<String>)>>>,
}

impl RecordingNotificationSink {
    /// Creates a new recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded status change.
    pub async fn status_changes(&self) -> Vec<StatusChanged> {
        self.status_changes.read().await.clone()
    }

    /// Returns every recorded bounce event.
    pub async fn bounces(&self) -> Vec<(OrderId, Option<String>)> {
        self.bounces.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn status_changed(&self, event: StatusChanged) {
        self.status_changes.write().await.push(event);
    }

    async fn order_bounced(&self, order_id: OrderId, reason: Option<String>) {
        self.bounces.write().await.push((order_id, reason));
    }
}
