//! Deployment policy for the fulfillment state machine.

use crate::status::OrderStatus;

/// Policy knobs for behavior the transition graph leaves open.
#[derive(Debug, Clone)]
pub struct FulfillmentPolicy {
    /// Where a failed verification sends the order. Canonical: `confirmed`.
    /// `pending` is the only other accepted target.
    pub bounce_target: OrderStatus,

    /// Whether `assigned_staff` is cleared when a verification bounces.
    pub clear_assignee_on_bounce: bool,

    /// Statuses a claim is accepted from. Canonical: `packing` only.
    pub claimable: Vec<OrderStatus>,
}

impl Default for FulfillmentPolicy {
    fn default() -> Self {
        Self {
            bounce_target: OrderStatus::Confirmed,
            clear_assignee_on_bounce: true,
            claimable: vec![OrderStatus::Packing],
        }
    }
}

impl FulfillmentPolicy {
    /// Loads the policy from environment variables, falling back to defaults.
    ///
    /// - `BOUNCE_TARGET` — `confirmed` (default) or `pending`
    /// - `CLEAR_ASSIGNEE_ON_BOUNCE` — `true` (default) or `false`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bounce_target = match std::env::var("BOUNCE_TARGET").ok().as_deref() {
            Some("pending") => OrderStatus::Pending,
            _ => defaults.bounce_target,
        };
        let clear_assignee_on_bounce = std::env::var("CLEAR_ASSIGNEE_ON_BOUNCE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.clear_assignee_on_bounce);

        Self {
            bounce_target,
            clear_assignee_on_bounce,
            claimable: defaults.claimable,
        }
    }

    /// Returns true if a claim is accepted from `status`.
    pub fn is_claimable(&self, status: OrderStatus) -> bool {
        self.claimable.contains(&status)
    }
}
