//! CancelSubscriptionHandler - Owner-initiated cancellation.

use std::sync::Arc;

use crate::application::PaymentGateways;
use crate::domain::foundation::{PageId, Timestamp, UserId};
use crate::domain::subscription::{
    apply_subscription_event, next_state, BillingError, BillingEvent, PageSubscription,
    SubscriptionEvent, TransitionOutcome,
};
use crate::ports::{CancelRequest, PageRepository, UserRepository};

/// Command to cancel a page subscription.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
    pub page_id: PageId,

    /// End access now instead of at the end of the billing period.
    pub immediate: bool,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub page: PageSubscription,
}

/// Handler for cancelling page subscriptions.
///
/// The provider is told first. Only when it accepts is the page moved to
/// `cancelling` (or `cancelled` for an immediate cancel), so a provider
/// failure leaves the page untouched.
pub struct CancelSubscriptionHandler {
    pages: Arc<dyn PageRepository>,
    users: Arc<dyn UserRepository>,
    gateways: PaymentGateways,
}

impl CancelSubscriptionHandler {
    pub fn new(
        pages: Arc<dyn PageRepository>,
        users: Arc<dyn UserRepository>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            pages,
            users,
            gateways,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        // 1. Load page and check ownership
        let page = self
            .pages
            .find_by_id(&cmd.page_id)
            .await?
            .ok_or_else(|| BillingError::not_found("page", cmd.page_id))?;

        if !page.is_owned_by(&cmd.user_id) {
            return Err(BillingError::forbidden(
                "only the page owner can cancel the subscription",
            ));
        }

        // 2. Check the transition before touching the provider
        let kind = BillingEvent::CancelRequested {
            immediate: cmd.immediate,
        };
        next_state(page.state()?, &kind)?;

        let (provider, subscription_id) = match (page.provider, &page.provider_subscription_id) {
            (Some(provider), Some(id)) => (provider, id.clone()),
            _ => {
                return Err(BillingError::infrastructure(format!(
                    "page {} is paid but has no provider subscription",
                    page.page_id
                )))
            }
        };

        let customer_id = self
            .users
            .find_by_id(&page.user_id)
            .await?
            .and_then(|u| u.customer_id(provider).map(str::to_string));

        // 3. Cancel at the provider
        let gateway = self.gateways.get(provider)?;
        let cancelled = gateway
            .cancel_subscription(CancelRequest {
                customer_id,
                subscription_id: subscription_id.clone(),
                at_period_end: !cmd.immediate,
            })
            .await
            .map_err(|e| {
                tracing::warn!(
                    page_id = %page.page_id,
                    provider = %provider,
                    error = %e,
                    "Provider rejected cancellation"
                );
                BillingError::from(e)
            })?;

        // 4. Apply and persist
        let now = Timestamp::now().as_unix_secs();
        let sequence = page.last_event_sequence.map_or(now, |last| last.max(now));
        let event = SubscriptionEvent::new(
            format!("cancel_{}", uuid::Uuid::new_v4()),
            sequence,
            provider,
            kind,
        );

        let mut updated = match apply_subscription_event(&page, &event)? {
            TransitionOutcome::Applied(updated) => updated,
            TransitionOutcome::AlreadyApplied => page.clone(),
        };
        if !cmd.immediate {
            updated.current_period_end = cancelled.period_end;
        }
        let stored = self.pages.update_if_version(&updated, page.version).await?;

        tracing::info!(
            page_id = %stored.page_id,
            subscription_id = %subscription_id,
            immediate = cmd.immediate,
            status = %stored.status,
            period_end = ?stored.current_period_end,
            "Subscription cancelled"
        );

        Ok(CancelSubscriptionResult { page: stored })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryPageRepository, InMemoryUserRepository, MockPaymentGateway};
    use crate::domain::account::User;
    use crate::domain::subscription::{
        ProviderKind, SubscriptionPlan, SubscriptionState, SubscriptionStatus,
    };
    use crate::ports::PaymentError;

    struct Fixture {
        pages: Arc<InMemoryPageRepository>,
        gateway: MockPaymentGateway,
        handler: CancelSubscriptionHandler,
        page: PageSubscription,
    }

    fn owner() -> UserId {
        UserId::new("owner").unwrap()
    }

    async fn fixture(state: SubscriptionState) -> Fixture {
        let pages = Arc::new(InMemoryPageRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let gateway = MockPaymentGateway::new(ProviderKind::Mollie);

        let mut page = PageSubscription::new_free(PageId::new(), owner());
        page.set_state(state);
        if state.plan().is_paid() {
            page.provider = Some(ProviderKind::Mollie);
            page.provider_subscription_id = Some("sub_123".to_string());
            page.last_event_id = Some("tr_first".to_string());
            page.last_event_sequence = Some(1_700_000_000);
        }
        pages.insert(page.clone()).await;

        let mut user = User::new(owner(), "owner@example.com");
        user.set_customer_id(ProviderKind::Mollie, "cst_1");
        users.insert(user).await;

        let handler = CancelSubscriptionHandler::new(
            pages.clone(),
            users,
            PaymentGateways::single(Arc::new(gateway.clone())),
        );

        Fixture {
            pages,
            gateway,
            handler,
            page,
        }
    }

    fn command(page_id: PageId, immediate: bool) -> CancelSubscriptionCommand {
        CancelSubscriptionCommand {
            user_id: owner(),
            page_id,
            immediate,
        }
    }

    #[tokio::test]
    async fn cancel_at_period_end_keeps_access() {
        let f = fixture(SubscriptionState::Active(SubscriptionPlan::Pro)).await;

        let result = f.handler.handle(command(f.page.page_id, false)).await.unwrap();

        assert_eq!(
            result.page.state().unwrap(),
            SubscriptionState::Cancelling(SubscriptionPlan::Pro)
        );
        assert_eq!(result.page.status, SubscriptionStatus::Active);
        assert!(result.page.cancel_at_period_end);
        assert_eq!(result.page.version, 1);

        let cancellations = f.gateway.cancellations();
        assert_eq!(cancellations.len(), 1);
        assert!(cancellations[0].at_period_end);
        assert_eq!(cancellations[0].subscription_id, "sub_123");
        assert_eq!(cancellations[0].customer_id.as_deref(), Some("cst_1"));
    }

    #[tokio::test]
    async fn cancel_at_period_end_records_period_end() {
        let f = fixture(SubscriptionState::Active(SubscriptionPlan::Pro)).await;
        let period_end = Timestamp::now().add_days(12);
        f.gateway.set_period_end(period_end);

        let result = f.handler.handle(command(f.page.page_id, false)).await.unwrap();

        assert_eq!(result.page.current_period_end, Some(period_end));
        assert_eq!(
            f.pages.get(&f.page.page_id).await.unwrap().current_period_end,
            Some(period_end)
        );
    }

    #[tokio::test]
    async fn immediate_cancel_records_no_period_end() {
        let f = fixture(SubscriptionState::Active(SubscriptionPlan::Pro)).await;
        f.gateway.set_period_end(Timestamp::now().add_days(12));

        let result = f.handler.handle(command(f.page.page_id, true)).await.unwrap();

        assert_eq!(result.page.current_period_end, None);
    }

    #[tokio::test]
    async fn immediate_cancel_ends_subscription() {
        let f = fixture(SubscriptionState::Active(SubscriptionPlan::Start)).await;

        let result = f.handler.handle(command(f.page.page_id, true)).await.unwrap();

        assert_eq!(
            result.page.state().unwrap(),
            SubscriptionState::Cancelled(SubscriptionPlan::Start)
        );
        assert!(!f.gateway.cancellations()[0].at_period_end);
    }

    #[tokio::test]
    async fn sequence_never_goes_backwards() {
        let f = fixture(SubscriptionState::Active(SubscriptionPlan::Pro)).await;

        let result = f.handler.handle(command(f.page.page_id, false)).await.unwrap();

        assert!(result.page.last_event_sequence.unwrap() >= 1_700_000_000);
        assert!(result
            .page
            .last_event_id
            .as_deref()
            .unwrap()
            .starts_with("cancel_"));
    }

    #[tokio::test]
    async fn provider_failure_leaves_page_unchanged() {
        let f = fixture(SubscriptionState::Active(SubscriptionPlan::Pro)).await;
        f.gateway
            .set_method_error("cancel_subscription", PaymentError::network("timeout"));

        let err = f
            .handler
            .handle(command(f.page.page_id, false))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Provider(_)));
        assert_eq!(f.pages.get(&f.page.page_id).await.unwrap(), f.page);
    }

    #[tokio::test]
    async fn free_page_cannot_be_cancelled() {
        let f = fixture(SubscriptionState::Free).await;

        let err = f
            .handler
            .handle(command(f.page.page_id, false))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidTransition { .. }));
        assert!(!f.gateway.was_called("cancel_subscription"));
    }

    #[tokio::test]
    async fn lapsed_page_cannot_be_cancelled() {
        let f = fixture(SubscriptionState::Lapsed(SubscriptionPlan::Pro)).await;

        let err = f
            .handler
            .handle(command(f.page.page_id, true))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let f = fixture(SubscriptionState::Active(SubscriptionPlan::Pro)).await;

        let mut cmd = command(f.page.page_id, false);
        cmd.user_id = UserId::new("someone-else").unwrap();
        let err = f.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, BillingError::Forbidden(_)));
        assert!(!f.gateway.was_called("cancel_subscription"));
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let f = fixture(SubscriptionState::Active(SubscriptionPlan::Pro)).await;

        let err = f
            .handler
            .handle(command(PageId::new(), false))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::NotFound { .. }));
    }
}
