//! In-memory order store.
//!
//! The storage layer has no row locks, so the store exposes one exclusive
//! write lock that every order mutation serializes through. Lock hold times
//! cover only in-memory work; callers must not perform network I/O while
//! holding a guard.

use std::collections::HashMap;
use std::sync::Arc;

use common::OrderId;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::order::Order;
use crate::status::OrderStatus;

/// Shared order registry.
#[derive(Debug, Clone, Default)]
pub struct OrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl OrderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a freshly created order.
    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    /// Returns a snapshot of an order.
    pub async fn get(&self, order_id: OrderId) -> Option<Order> {
        self.orders.read().await.get(&order_id).cloned()
    }

    /// Returns snapshots of every order in `status`.
    pub async fn with_status(&self, status: OrderStatus) -> Vec<Order> {
        self.orders
            .read()
            .await
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect()
    }

    /// Returns the number of orders stored.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns true if the store holds no orders.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    /// Acquires the exclusive write lock over all orders.
    ///
    /// Every mutation happens under this guard, which is what linearizes
    /// concurrent transition and claim attempts on the same order.
    pub(crate) async fn lock(&self) -> RwLockWriteGuard<'_, HashMap<OrderId, Order>> {
        self.orders.write().await
    }
}
