//! Page subscription aggregate.
//!
//! The subscription-relevant slice of a page row. Page CRUD lives elsewhere;
//! this crate only reads and conditionally updates these columns.
//!
//! # Invariants
//!
//! - A free page has status `none` and no provider subscription id
//! - `last_event_sequence` never decreases
//! - `version` is bumped by the store on every successful update

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PageId, Timestamp, UserId};

use super::{BillingError, ProviderKind, SubscriptionPlan, SubscriptionState, SubscriptionStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSubscription {
    pub page_id: PageId,

    /// Owner of the page. Only the owner may buy or cancel.
    pub user_id: UserId,

    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,

    /// Set together with status `active` while a cancellation is pending.
    pub cancel_at_period_end: bool,

    /// Provider owning `provider_subscription_id`.
    pub provider: Option<ProviderKind>,
    pub provider_subscription_id: Option<String>,

    /// End of the paid period, recorded when a cancellation is accepted.
    pub current_period_end: Option<Timestamp>,

    pub last_event_id: Option<String>,
    pub last_event_sequence: Option<i64>,

    /// Optimistic lock counter.
    pub version: i64,
    pub updated_at: Timestamp,
}

impl PageSubscription {
    /// Subscription columns of a freshly created page.
    pub fn new_free(page_id: PageId, user_id: UserId) -> Self {
        Self {
            page_id,
            user_id,
            plan: SubscriptionPlan::Free,
            status: SubscriptionStatus::None,
            cancel_at_period_end: false,
            provider: None,
            provider_subscription_id: None,
            current_period_end: None,
            last_event_id: None,
            last_event_sequence: None,
            version: 0,
            updated_at: Timestamp::now(),
        }
    }

    /// Current lifecycle state derived from the persisted columns.
    pub fn state(&self) -> Result<SubscriptionState, BillingError> {
        SubscriptionState::from_columns(self.plan, self.status, self.cancel_at_period_end)
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// Cancelling with a recorded period end at or before `as_of`.
    pub fn is_cancelling_due(&self, as_of: &Timestamp) -> bool {
        matches!(self.state(), Ok(SubscriptionState::Cancelling(_)))
            && self
                .current_period_end
                .is_some_and(|end| !as_of.is_before(&end))
    }

    /// Writes `state` into the plan, status and cancel flag columns.
    pub(crate) fn set_state(&mut self, state: SubscriptionState) {
        let (plan, status, cancel_at_period_end) = state.to_columns();
        self.plan = plan;
        self.status = status;
        self.cancel_at_period_end = cancel_at_period_end;
    }
}
