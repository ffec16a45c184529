//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its fulfillment lifecycle.
///
/// Canonical transition graph:
/// ```text
/// Pending ──► Confirmed ──► Packing ──► Verifying ──► Completed
///                 │  ▲         ▲  ▲          │            │
///                 │  └─────────┼──┴──(bounce)┘            │
///                 ▼            └──────(admin revert)──────┘
///             Cancelled
/// ```
/// The `packing → verifying` edge is walked only by the assignment
/// coordinator's claim; a failed verification bounces back to `confirmed`
/// (or `pending`, policy-selectable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed, awaiting confirmation.
    #[default]
    Pending,

    /// Confirmed by preparation staff, not yet picked for packing.
    Confirmed,

    /// Approved for packing; stock for its items is reserved.
    Packing,

    /// Claimed by a packing staff member who is verifying the items.
    Verifying,

    /// Verified and handed off (items stay deducted).
    Completed,

    /// Cancelled before packing (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if `target` is an edge of the canonical transition graph.
    ///
    /// Both bounce targets (`confirmed` and `pending`) are edges of the
    /// graph; which one a deployment actually uses is a policy decision
    /// enforced by the state machine.
    pub fn has_edge_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Pending, Confirmed)
                | (Confirmed, Cancelled)
                | (Confirmed, Packing)
                | (Packing, Verifying)
                | (Verifying, Completed)
                | (Verifying, Confirmed)
                | (Verifying, Pending)
                | (Completed, Packing)
        )
    }

    /// Returns true if the order can be confirmed in this status.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Confirmed)
    }

    /// Returns true if the order can be approved for packing in this status.
    pub fn can_approve_for_packing(&self) -> bool {
        matches!(self, OrderStatus::Confirmed)
    }

    /// Returns true if a claim can move the order into verification.
    pub fn can_start_verifying(&self) -> bool {
        matches!(self, OrderStatus::Packing)
    }

    /// Returns true if verification can conclude (either way) in this status.
    pub fn can_finish_verifying(&self) -> bool {
        matches!(self, OrderStatus::Verifying)
    }

    /// Returns true if this is a terminal status with no outgoing edge.
    ///
    /// `completed` is not terminal: an admin revert can send it back to
    /// `packing`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Packing => "packing",
            OrderStatus::Verifying => "verifying",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 6] = [Pending, Confirmed, Packing, Verifying, Completed, Cancelled];

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), Pending);
    }

    #[test]
    fn canonical_edges_are_present() {
        assert!(Pending.has_edge_to(Confirmed));
        assert!(Confirmed.has_edge_to(Cancelled));
        assert!(Confirmed.has_edge_to(Packing));
        assert!(Packing.has_edge_to(Verifying));
        assert!(Verifying.has_edge_to(Completed));
        assert!(Verifying.has_edge_to(Confirmed));
        assert!(Verifying.has_edge_to(Pending));
        assert!(Completed.has_edge_to(Packing));
    }

    #[test]
    fn cancelled_is_a_dead_end() {
        for target in ALL {
            assert!(!Cancelled.has_edge_to(target), "cancelled -> {target}");
        }
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn no_skipping_forward() {
        assert!(!Pending.has_edge_to(Packing));
        assert!(!Pending.has_edge_to(Verifying));
        assert!(!Pending.has_edge_to(Completed));
        assert!(!Confirmed.has_edge_to(Verifying));
        assert!(!Confirmed.has_edge_to(Completed));
        assert!(!Packing.has_edge_to(Completed));
    }

    #[test]
    fn completed_is_not_terminal() {
        assert!(!Completed.is_terminal());
        assert!(Completed.has_edge_to(Packing));
    }

    #[test]
    fn predicates_match_edges() {
        assert!(Pending.can_confirm());
        assert!(Confirmed.can_cancel());
        assert!(Confirmed.can_approve_for_packing());
        assert!(Packing.can_start_verifying());
        assert!(Verifying.can_finish_verifying());

        assert!(!Verifying.can_confirm());
        assert!(!Packing.can_cancel());
        assert!(!Pending.can_start_verifying());
    }

    #[test]
    fn display_uses_snake_case_vocabulary() {
        assert_eq!(Packing.to_string(), "packing");
        assert_eq!(Verifying.to_string(), "verifying");
    }

    #[test]
    fn serialization_roundtrip() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            let back: OrderStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, back);
        }
    }
}
