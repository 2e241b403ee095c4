//! HandleProviderWebhookHandler - Applies payment provider webhooks to pages.

use std::sync::Arc;

use crate::application::PaymentGateways;
use crate::domain::discount::NormalizedCode;
use crate::domain::foundation::PageId;
use crate::domain::subscription::{
    apply_subscription_event, is_already_reflected, BillingError, BillingEvent,
    PageSubscription, ProviderKind, SubscriptionState, TransitionOutcome,
};
use crate::ports::{
    DiscountCodeRepository, PageLocator, PageRepository, PaymentGateway, RedemptionOutcome,
    TranslatedEvent, WebhookEventRecord, WebhookEventRepository, WebhookTranslation,
};

/// Command to handle a webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleProviderWebhookCommand {
    pub provider: ProviderKind,

    /// Raw request body.
    pub payload: Vec<u8>,

    /// Signature header, for providers that sign deliveries.
    pub signature: Option<String>,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleProviderWebhookResult {
    /// The page moved to a new state.
    Applied {
        page_id: PageId,
        state: SubscriptionState,
    },
    /// The page already reflects the event.
    Acknowledged { page_id: PageId },
    /// Authentic but not applied (irrelevant type or out of order).
    Ignored { reason: String },
    /// Redelivery of an event that was already handled.
    AlreadyProcessed,
}

/// Handler for provider webhooks.
///
/// Processing order:
/// 1. The gateway authenticates and translates the delivery, without side effects
/// 2. Deliveries already in the processed log are skipped
/// 3. The event is checked against the page (duplicate, stale, transition)
/// 4. A checkout still missing its provider subscription is completed
/// 5. The page is persisted with a version check
/// 6. A discount carried by a completed checkout is redeemed
/// 7. The delivery is recorded in the processed log
///
/// Errors are not recorded, so the provider's retry gets a fresh attempt.
pub struct HandleProviderWebhookHandler {
    pages: Arc<dyn PageRepository>,
    discount_codes: Arc<dyn DiscountCodeRepository>,
    webhook_events: Arc<dyn WebhookEventRepository>,
    gateways: PaymentGateways,
}

impl HandleProviderWebhookHandler {
    pub fn new(
        pages: Arc<dyn PageRepository>,
        discount_codes: Arc<dyn DiscountCodeRepository>,
        webhook_events: Arc<dyn WebhookEventRepository>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            pages,
            discount_codes,
            webhook_events,
            gateways,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleProviderWebhookCommand,
    ) -> Result<HandleProviderWebhookResult, BillingError> {
        let provider = cmd.provider;
        let gateway = self.gateways.get(provider)?;

        // 1. Authenticate and translate
        let translation = gateway
            .translate_webhook(&cmd.payload, cmd.signature.as_deref())
            .await
            .map_err(|e| {
                tracing::warn!(provider = %provider, error = %e, "Webhook rejected");
                BillingError::from(e)
            })?;

        match translation {
            WebhookTranslation::Ignored {
                event_id,
                event_type,
                reason,
                payload,
            } => {
                if self.webhook_events.find(provider, &event_id).await?.is_some() {
                    return Ok(HandleProviderWebhookResult::AlreadyProcessed);
                }
                tracing::info!(
                    provider = %provider,
                    event_id = %event_id,
                    event_type = %event_type,
                    reason = %reason,
                    "Webhook ignored"
                );
                self.webhook_events
                    .save(WebhookEventRecord::ignored(
                        provider, event_id, event_type, reason.clone(), payload,
                    ))
                    .await?;
                Ok(HandleProviderWebhookResult::Ignored { reason })
            }
            WebhookTranslation::Event(translated) => {
                self.apply(provider, &*gateway, translated).await
            }
        }
    }

    async fn apply(
        &self,
        provider: ProviderKind,
        gateway: &dyn PaymentGateway,
        translated: TranslatedEvent,
    ) -> Result<HandleProviderWebhookResult, BillingError> {
        let event_id = translated.event.event_id.clone();

        // 2. Skip redeliveries
        if self.webhook_events.find(provider, &event_id).await?.is_some() {
            tracing::debug!(provider = %provider, event_id = %event_id, "Webhook already processed");
            return Ok(HandleProviderWebhookResult::AlreadyProcessed);
        }

        // Locate the page
        let page = self.locate(provider, &translated.locator).await?;
        let state = page.state()?;

        if is_already_reflected(state, &translated.event.kind) {
            tracing::info!(
                page_id = %page.page_id,
                event_id = %event_id,
                event = translated.event.kind.name(),
                state = %state,
                "Webhook already reflected by page state"
            );
            self.record_ignored(provider, &translated, &page, "already reflected")
                .await?;
            return Ok(HandleProviderWebhookResult::Acknowledged {
                page_id: page.page_id,
            });
        }

        // 3. Check the event against the page
        let updated = match apply_subscription_event(&page, &translated.event) {
            Ok(TransitionOutcome::Applied(updated)) => updated,
            Ok(TransitionOutcome::AlreadyApplied) => {
                self.redeem_discount(&translated).await?;
                return Ok(HandleProviderWebhookResult::AlreadyProcessed);
            }
            Err(BillingError::StaleEvent {
                sequence,
                last_sequence,
                ..
            }) => {
                tracing::warn!(
                    page_id = %page.page_id,
                    event_id = %event_id,
                    sequence,
                    last_sequence,
                    "Stale webhook ignored"
                );
                self.record_ignored(provider, &translated, &page, "stale event")
                    .await?;
                return Ok(HandleProviderWebhookResult::Ignored {
                    reason: "stale event".to_string(),
                });
            }
            Err(err) => {
                tracing::warn!(
                    page_id = %page.page_id,
                    event_id = %event_id,
                    event = translated.event.kind.name(),
                    state = %state,
                    error = %err,
                    "Webhook could not be applied"
                );
                return Err(err);
            }
        };

        // 4. Provider setup runs only for an event this page has not seen
        let (translated, updated) = if translated.subscription_pending {
            let completed = gateway.complete_checkout(translated).await.map_err(|e| {
                tracing::warn!(
                    page_id = %page.page_id,
                    event_id = %event_id,
                    error = %e,
                    "Checkout completion failed"
                );
                BillingError::from(e)
            })?;
            match apply_subscription_event(&page, &completed.event)? {
                TransitionOutcome::Applied(updated) => (completed, updated),
                TransitionOutcome::AlreadyApplied => {
                    return Ok(HandleProviderWebhookResult::AlreadyProcessed)
                }
            }
        } else {
            (translated, updated)
        };

        // 5. Persist
        let stored = self.pages.update_if_version(&updated, page.version).await?;
        let new_state = stored.state()?;

        tracing::info!(
            page_id = %stored.page_id,
            provider = %provider,
            event_id = %event_id,
            from = %state,
            to = %new_state,
            "Subscription transition applied"
        );

        // 6. Redeem discount, then 7. record
        self.redeem_discount(&translated).await?;

        self.webhook_events
            .save(
                WebhookEventRecord::success(
                    provider,
                    event_id,
                    translated.event_type.clone(),
                    translated.payload.clone(),
                )
                .for_page(stored.page_id),
            )
            .await?;

        Ok(HandleProviderWebhookResult::Applied {
            page_id: stored.page_id,
            state: new_state,
        })
    }

    async fn locate(
        &self,
        provider: ProviderKind,
        locator: &PageLocator,
    ) -> Result<PageSubscription, BillingError> {
        match locator {
            PageLocator::Page(page_id) => self
                .pages
                .find_by_id(page_id)
                .await?
                .ok_or_else(|| BillingError::not_found("page", page_id)),
            PageLocator::ProviderSubscription(subscription_id) => self
                .pages
                .find_by_provider_subscription_id(provider, subscription_id)
                .await?
                .ok_or_else(|| BillingError::not_found("subscription", subscription_id)),
        }
    }

    async fn redeem_discount(&self, translated: &TranslatedEvent) -> Result<(), BillingError> {
        let (code, session_id) = match &translated.event.kind {
            BillingEvent::CheckoutCompleted {
                discount_code: Some(code),
                checkout_session_id: Some(session_id),
                ..
            } => (code, session_id),
            _ => return Ok(()),
        };

        let code = NormalizedCode::for_lookup(code)?;
        let outcome = self
            .discount_codes
            .record_redemption(&code, session_id)
            .await?;

        match outcome {
            RedemptionOutcome::Recorded => {
                tracing::info!(code = %code.as_str(), session_id = %session_id, "Discount redeemed")
            }
            RedemptionOutcome::AlreadyRecorded => {
                tracing::debug!(code = %code.as_str(), session_id = %session_id, "Discount already redeemed")
            }
            RedemptionOutcome::RecordedOverLimit => tracing::warn!(
                code = %code.as_str(),
                session_id = %session_id,
                "Discount used past its redemption limit"
            ),
        }
        Ok(())
    }

    async fn record_ignored(
        &self,
        provider: ProviderKind,
        translated: &TranslatedEvent,
        page: &PageSubscription,
        reason: &str,
    ) -> Result<(), BillingError> {
        self.webhook_events
            .save(
                WebhookEventRecord::ignored(
                    provider,
                    translated.event.event_id.clone(),
                    translated.event_type.clone(),
                    reason,
                    translated.payload.clone(),
                )
                .for_page(page.page_id),
            )
            .await?;
        Ok(())
    }
}
