//! Subscription lifecycle states.
//!
//! `SubscriptionPhase` is the bare state machine; `SubscriptionState` pairs a
//! phase with the plan it applies to and knows how to map itself onto the
//! persisted `(plan, status, cancel_at_period_end)` columns.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

use super::{BillingError, SubscriptionPlan, SubscriptionStatus};

/// Lifecycle phase of a page subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPhase {
    /// No paid plan. Initial state of every page.
    Free,

    /// Paid and current.
    Active,

    /// Cancellation requested; access continues until the period closes.
    Cancelling,

    /// Renewal payment failed. Access retained while the provider retries.
    Lapsed,

    /// Subscription ended. A new checkout may start again at any time.
    Cancelled,
}

impl SubscriptionPhase {
    /// Returns true if the page gets paid-plan features in this phase.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionPhase::Active | SubscriptionPhase::Cancelling | SubscriptionPhase::Lapsed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPhase::Free => "free",
            SubscriptionPhase::Active => "active",
            SubscriptionPhase::Cancelling => "cancelling",
            SubscriptionPhase::Lapsed => "lapsed",
            SubscriptionPhase::Cancelled => "cancelled",
        }
    }
}

impl StateMachine for SubscriptionPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionPhase::*;
        matches!(
            (self, target),
            (Free, Active)
                | (Active, Cancelling)
                | (Active, Cancelled)
                | (Active, Lapsed)
                | (Lapsed, Active)
                | (Cancelling, Cancelled)
                | (Cancelled, Active)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionPhase::*;
        match self {
            Free => vec![Active],
            Active => vec![Cancelling, Cancelled, Lapsed],
            Lapsed => vec![Active],
            Cancelling => vec![Cancelled],
            Cancelled => vec![Active],
        }
    }
}

impl std::fmt::Display for SubscriptionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription state of a page, carrying the plan for every paid phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    Free,
    Active(SubscriptionPlan),
    Cancelling(SubscriptionPlan),
    Lapsed(SubscriptionPlan),
    Cancelled(SubscriptionPlan),
}

impl SubscriptionState {
    pub fn phase(&self) -> SubscriptionPhase {
        match self {
            SubscriptionState::Free => SubscriptionPhase::Free,
            SubscriptionState::Active(_) => SubscriptionPhase::Active,
            SubscriptionState::Cancelling(_) => SubscriptionPhase::Cancelling,
            SubscriptionState::Lapsed(_) => SubscriptionPhase::Lapsed,
            SubscriptionState::Cancelled(_) => SubscriptionPhase::Cancelled,
        }
    }

    pub fn plan(&self) -> SubscriptionPlan {
        match self {
            SubscriptionState::Free => SubscriptionPlan::Free,
            SubscriptionState::Active(plan)
            | SubscriptionState::Cancelling(plan)
            | SubscriptionState::Lapsed(plan)
            | SubscriptionState::Cancelled(plan) => *plan,
        }
    }

    /// Builds a paid-phase state for `plan`.
    ///
    /// Returns `None` for a paid phase paired with the free plan, or for the
    /// free phase paired with a paid plan.
    pub fn from_phase(phase: SubscriptionPhase, plan: SubscriptionPlan) -> Option<Self> {
        match (phase, plan.is_paid()) {
            (SubscriptionPhase::Free, false) => Some(SubscriptionState::Free),
            (SubscriptionPhase::Active, true) => Some(SubscriptionState::Active(plan)),
            (SubscriptionPhase::Cancelling, true) => Some(SubscriptionState::Cancelling(plan)),
            (SubscriptionPhase::Lapsed, true) => Some(SubscriptionState::Lapsed(plan)),
            (SubscriptionPhase::Cancelled, true) => Some(SubscriptionState::Cancelled(plan)),
            _ => None,
        }
    }

    /// Maps this state onto the persisted columns.
    ///
    /// Returns `(plan, status, cancel_at_period_end)`.
    pub fn to_columns(&self) -> (SubscriptionPlan, SubscriptionStatus, bool) {
        match *self {
            SubscriptionState::Free => (SubscriptionPlan::Free, SubscriptionStatus::None, false),
            SubscriptionState::Active(plan) => (plan, SubscriptionStatus::Active, false),
            SubscriptionState::Cancelling(plan) => (plan, SubscriptionStatus::Active, true),
            SubscriptionState::Lapsed(plan) => (plan, SubscriptionStatus::PastDue, false),
            SubscriptionState::Cancelled(plan) => (plan, SubscriptionStatus::Cancelled, false),
        }
    }

    /// Reconstructs a state from the persisted columns.
    ///
    /// Rejects combinations no transition can produce, such as a free page
    /// with a non-`none` status.
    pub fn from_columns(
        plan: SubscriptionPlan,
        status: SubscriptionStatus,
        cancel_at_period_end: bool,
    ) -> Result<Self, BillingError> {
        let state = match (plan.is_paid(), status, cancel_at_period_end) {
            (false, SubscriptionStatus::None, false) => Some(SubscriptionState::Free),
            (true, SubscriptionStatus::Active, false) => Some(SubscriptionState::Active(plan)),
            (true, SubscriptionStatus::Active, true) => Some(SubscriptionState::Cancelling(plan)),
            (true, SubscriptionStatus::PastDue, false) => Some(SubscriptionState::Lapsed(plan)),
            (true, SubscriptionStatus::Cancelled, false) => {
                Some(SubscriptionState::Cancelled(plan))
            }
            _ => None,
        };

        state.ok_or_else(|| {
            BillingError::infrastructure(format!(
                "inconsistent subscription columns: plan={}, status={}, cancel_at_period_end={}",
                plan, status, cancel_at_period_end
            ))
        })
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionState::Free => write!(f, "free"),
            other => write!(f, "{}({})", other.phase(), other.plan()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [SubscriptionPhase; 5] = [
        SubscriptionPhase::Free,
        SubscriptionPhase::Active,
        SubscriptionPhase::Cancelling,
        SubscriptionPhase::Lapsed,
        SubscriptionPhase::Cancelled,
    ];

    #[test]
    fn free_can_only_become_active() {
        assert_eq!(
            SubscriptionPhase::Free.valid_transitions(),
            vec![SubscriptionPhase::Active]
        );
    }

    #[test]
    fn cancelling_cannot_skip_back_to_active() {
        assert!(!SubscriptionPhase::Cancelling.can_transition_to(&SubscriptionPhase::Active));
        assert!(SubscriptionPhase::Cancelling
            .transition_to(SubscriptionPhase::Active)
            .is_err());
    }

    #[test]
    fn lapsed_cannot_be_cancelled_directly() {
        assert!(!SubscriptionPhase::Lapsed.can_transition_to(&SubscriptionPhase::Cancelled));
    }

    #[test]
    fn no_phase_is_terminal() {
        for phase in ALL_PHASES {
            assert!(!phase.is_terminal(), "{:?} should allow resubscription", phase);
        }
    }

    #[test]
    fn valid_transitions_are_consistent_with_can_transition_to() {
        for phase in ALL_PHASES {
            for target in ALL_PHASES {
                assert_eq!(
                    phase.can_transition_to(&target),
                    phase.valid_transitions().contains(&target),
                    "{:?} -> {:?}",
                    phase,
                    target
                );
            }
        }
    }

    #[test]
    fn access_follows_phase() {
        assert!(!SubscriptionPhase::Free.has_access());
        assert!(SubscriptionPhase::Active.has_access());
        assert!(SubscriptionPhase::Cancelling.has_access());
        assert!(SubscriptionPhase::Lapsed.has_access());
        assert!(!SubscriptionPhase::Cancelled.has_access());
    }

    #[test]
    fn columns_round_trip_for_every_state() {
        let states = [
            SubscriptionState::Free,
            SubscriptionState::Active(SubscriptionPlan::Pro),
            SubscriptionState::Cancelling(SubscriptionPlan::Start),
            SubscriptionState::Lapsed(SubscriptionPlan::Pro),
            SubscriptionState::Cancelled(SubscriptionPlan::Start),
        ];
        for state in states {
            let (plan, status, flag) = state.to_columns();
            assert_eq!(SubscriptionState::from_columns(plan, status, flag), Ok(state));
        }
    }

    #[test]
    fn free_page_with_status_is_inconsistent() {
        let result = SubscriptionState::from_columns(
            SubscriptionPlan::Free,
            SubscriptionStatus::Active,
            false,
        );
        assert!(matches!(result, Err(BillingError::Infrastructure(_))));
    }

    #[test]
    fn paid_page_without_status_is_inconsistent() {
        let result =
            SubscriptionState::from_columns(SubscriptionPlan::Pro, SubscriptionStatus::None, false);
        assert!(result.is_err());
    }

    #[test]
    fn from_phase_rejects_mismatched_plan() {
        assert_eq!(
            SubscriptionState::from_phase(SubscriptionPhase::Active, SubscriptionPlan::Free),
            None
        );
        assert_eq!(
            SubscriptionState::from_phase(SubscriptionPhase::Lapsed, SubscriptionPlan::Pro),
            Some(SubscriptionState::Lapsed(SubscriptionPlan::Pro))
        );
    }

    #[test]
    fn display_includes_plan() {
        assert_eq!(
            SubscriptionState::Cancelling(SubscriptionPlan::Pro).to_string(),
            "cancelling(pro)"
        );
        assert_eq!(SubscriptionState::Free.to_string(), "free");
    }
}
