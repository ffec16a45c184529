//! Shared types for the fulfillment core.
//!
//! This crate provides the typed identifiers used across the workspace,
//! the `Money` value type, and the resolved caller identity (`Actor`)
//! that the identity collaborator hands to every request.

pub mod actor;
pub mod types;

pub use actor::{Actor, ChangedBy, Position, Role};
pub use types::{CameraId, CustomerId, Money, OrderId, ProductId, StaffId};
