//! Append-only status audit log.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{ChangedBy, OrderId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::status::OrderStatus;

/// One successful status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    /// The order whose status changed.
    pub order_id: OrderId,
    /// Status before the change.
    pub old_status: OrderStatus,
    /// Status after the change.
    pub new_status: OrderStatus,
    /// Caller-supplied reason, if any.
    pub reason: Option<String>,
    /// Who performed the change.
    pub changed_by: ChangedBy,
    /// When the change was recorded.
    pub created_at: DateTime<Utc>,
}

/// Append-only log of status changes, one entry per successful transition.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Arc<RwLock<Vec<StatusLogEntry>>>,
}

impl AuditLog {
    /// Creates an empty audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Entries are never updated or removed.
    pub async fn append(&self, entry: StatusLogEntry) {
        self.entries.write().await.push(entry);
    }

    /// Returns the status history of an order, newest first.
    pub async fn history(&self, order_id: OrderId) -> Vec<StatusLogEntry> {
        let entries = self.entries.read().await;
        let mut history: Vec<_> = entries
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect();
        history.reverse();
        history
    }

    /// Returns the status history of an order in the order it happened.
    pub async fn walk(&self, order_id: OrderId) -> Vec<StatusLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Returns the total number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
