//! Resolved caller identity.
//!
//! The identity collaborator authenticates requests and hands the core a
//! resolved `{actor_id, role, position, is_active}` tuple. The core only
//! ever checks this data; it never verifies credentials itself.

use serde::{Deserialize, Serialize};

use crate::types::StaffId;

/// Top-level account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Employee,
}

/// Staff position within the employee role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Admin,
    PreparationStaff,
    PackingStaff,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Position::Admin => "admin",
            Position::PreparationStaff => "preparation staff",
            Position::PackingStaff => "packing staff",
        };
        write!(f, "{name}")
    }
}

/// A caller identity resolved by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The staff member's id.
    pub id: StaffId,
    /// Account role.
    pub role: Role,
    /// Staff position; `None` for customer accounts.
    pub position: Option<Position>,
    /// Deactivated accounts are rejected by every staff operation.
    pub is_active: bool,
}

impl Actor {
    /// Creates an active employee actor with the given position.
    pub fn employee(id: StaffId, position: Position) -> Self {
        Self {
            id,
            role: Role::Employee,
            position: Some(position),
            is_active: true,
        }
    }

    /// Returns true if this is an active employee holding `position`.
    pub fn holds_position(&self, position: Position) -> bool {
        self.is_active && self.role == Role::Employee && self.position == Some(position)
    }
}

/// Attribution for an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangedBy {
    /// A staff member performed the change.
    Staff(StaffId),
    /// The system performed the change on its own behalf.
    System,
}

impl std::fmt::Display for ChangedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangedBy::Staff(id) => write!(f, "staff:{id}"),
            ChangedBy::System => write!(f, "system"),
        }
    }
}
