//! Provider-agnostic billing events.
//!
//! Provider adapters translate their webhook payloads into these; the
//! transition manager never sees provider wire formats.

use serde::{Deserialize, Serialize};

use super::{ProviderKind, SubscriptionPlan};

/// Abstract billing event driving the subscription state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingEvent {
    /// Customer finished checkout and the provider created a subscription.
    CheckoutCompleted {
        plan: SubscriptionPlan,
        provider_subscription_id: String,
        /// Provider checkout/payment id; keys discount redemption.
        checkout_session_id: Option<String>,
        discount_code: Option<String>,
    },

    /// Renewal payment failed.
    PaymentFailed,

    /// Renewal payment succeeded.
    PaymentRecovered,

    /// Owner asked to cancel.
    CancelRequested { immediate: bool },

    /// Billing period closed on a subscription marked to cancel.
    PeriodEndReached,
}

impl BillingEvent {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            BillingEvent::CheckoutCompleted { .. } => "checkout-completed",
            BillingEvent::PaymentFailed => "payment-failed",
            BillingEvent::PaymentRecovered => "payment-recovered",
            BillingEvent::CancelRequested { immediate: true } => "cancel-requested(immediate)",
            BillingEvent::CancelRequested { immediate: false } => "cancel-requested",
            BillingEvent::PeriodEndReached => "period-end-reached",
        }
    }
}

/// A billing event with the identity and ordering data needed to apply it
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    /// External event id (provider webhook id, or a generated id for
    /// owner-initiated actions).
    pub event_id: String,

    /// Monotonic ordering key: provider event creation time in Unix seconds.
    pub sequence: i64,

    /// Provider the event came from.
    pub provider: ProviderKind,

    pub kind: BillingEvent,
}

impl SubscriptionEvent {
    pub fn new(
        event_id: impl Into<String>,
        sequence: i64,
        provider: ProviderKind,
        kind: BillingEvent,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            sequence,
            provider,
            kind,
        }
    }
}
