//! Order lifecycle for the fulfillment core.
//!
//! This crate provides:
//! - the order status state machine with its stock-reservation side effects
//! - the assignment coordinator that lets exactly one staff member claim an
//!   order for packing
//! - the append-only status audit log
//! - the fire-and-forget notification interface
//!
//! All order mutations serialize through the order store's exclusive write
//! lock; stock side effects run inside the same critical section so either
//! every effect of a transition commits or none do.

pub mod audit;
pub mod coordinator;
pub mod error;
pub mod machine;
pub mod notify;
pub mod order;
pub mod policy;
pub mod status;
pub mod store;

pub use audit::{AuditLog, StatusLogEntry};
pub use coordinator::AssignmentCoordinator;
pub use error::FulfillmentError;
pub use machine::OrderStateMachine;
pub use notify::{NoopNotificationSink, NotificationSink, RecordingNotificationSink, StatusChanged};
pub use order::{Order, OrderItem};
pub use policy::FulfillmentPolicy;
pub use status::OrderStatus;
pub use store::OrderStore;

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
