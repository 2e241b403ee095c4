//! Subscription state transition manager.
//!
//! Pure functions computing the next subscription state of a page. The
//! caller persists the result with a version-checked update so concurrent
//! deliveries for one page serialize at the store.

use crate::domain::foundation::{StateMachine, Timestamp};

use super::{BillingError, BillingEvent, PageSubscription, SubscriptionEvent, SubscriptionState};

/// Result of applying an event to a page subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The event moved the state machine. Holds the page to persist.
    Applied(PageSubscription),

    /// The event id matches the last applied event. Nothing changes.
    AlreadyApplied,
}

/// Computes the state reached by applying `event` to `current`.
///
/// # Errors
///
/// - `InvalidTransition` for any edge not in the lifecycle table
/// - `InvalidInput` for a checkout that names the free plan
pub fn next_state(
    current: SubscriptionState,
    event: &BillingEvent,
) -> Result<SubscriptionState, BillingError> {
    use SubscriptionState::*;

    let next = match (current, event) {
        (Free | Cancelled(_), BillingEvent::CheckoutCompleted { plan, .. }) => {
            if !plan.is_paid() {
                return Err(BillingError::invalid_input(
                    "plan",
                    "checkout cannot complete for the free plan",
                ));
            }
            Active(*plan)
        }
        (Active(plan), BillingEvent::CancelRequested { immediate: false }) => Cancelling(plan),
        (Active(plan), BillingEvent::CancelRequested { immediate: true }) => Cancelled(plan),
        (Active(plan), BillingEvent::PaymentFailed) => Lapsed(plan),
        (Lapsed(plan), BillingEvent::PaymentRecovered) => Active(plan),
        (Cancelling(plan), BillingEvent::PeriodEndReached) => Cancelled(plan),
        (state, event) => {
            return Err(BillingError::invalid_transition(
                state.to_string(),
                event.name(),
            ))
        }
    };

    current
        .phase()
        .transition_to(next.phase())
        .map_err(|_| BillingError::invalid_transition(current.to_string(), event.name()))?;

    Ok(next)
}

/// Applies a provider or owner event to a page subscription.
///
/// Checks run in order: duplicate event id, then staleness, then the
/// lifecycle table. On success the returned page carries the new plan,
/// status, cancel flag, provider reference and event bookkeeping together;
/// the version is left for the store to bump.
///
/// # Errors
///
/// - `StaleEvent` if `event.sequence` is below the last applied sequence
/// - `InvalidTransition` / `InvalidInput` from [`next_state`]
/// - `Infrastructure` if the stored columns are inconsistent
pub fn apply_subscription_event(
    page: &PageSubscription,
    event: &SubscriptionEvent,
) -> Result<TransitionOutcome, BillingError> {
    if page.last_event_id.as_deref() == Some(event.event_id.as_str()) {
        return Ok(TransitionOutcome::AlreadyApplied);
    }

    if let Some(last_sequence) = page.last_event_sequence {
        if event.sequence < last_sequence {
            return Err(BillingError::StaleEvent {
                event_id: event.event_id.clone(),
                sequence: event.sequence,
                last_sequence,
            });
        }
    }

    let current = page.state()?;
    let next = next_state(current, &event.kind)?;

    let mut updated = page.clone();
    updated.set_state(next);

    if let BillingEvent::CheckoutCompleted {
        provider_subscription_id,
        ..
    } = &event.kind
    {
        updated.provider = Some(event.provider);
        updated.provider_subscription_id = Some(provider_subscription_id.clone());
        updated.current_period_end = None;
    }

    updated.last_event_id = Some(event.event_id.clone());
    updated.last_event_sequence = Some(event.sequence);
    updated.updated_at = Timestamp::now();

    Ok(TransitionOutcome::Applied(updated))
}

/// Returns true if `event` describes something `state` already reflects.
///
/// Providers report a successful renewal on healthy subscriptions and a
/// deletion after an immediate cancel; both are acknowledged without a
/// transition.
pub fn is_already_reflected(state: SubscriptionState, event: &BillingEvent) -> bool {
    matches!(
        (state, event),
        (
            SubscriptionState::Active(_) | SubscriptionState::Cancelling(_),
            BillingEvent::PaymentRecovered
        ) | (SubscriptionState::Cancelled(_), BillingEvent::PeriodEndReached)
    )
}
