//! ExpireCancelledSubscriptionsHandler - Ends cancelled subscriptions whose
//! paid period has run out.
//!
//! Mollie reports nothing when a subscription cancelled at period end
//! lapses. An operator (or cron calling the admin route) runs this sweep
//! to apply `period-end-reached` to every such page.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::foundation::{PageId, Timestamp};
use crate::domain::subscription::{
    apply_subscription_event, BillingError, BillingEvent, PageSubscription, SubscriptionEvent,
    TransitionOutcome,
};
use crate::ports::PageRepository;

#[derive(Debug, Clone)]
pub struct ExpireCancelledSubscriptionsCommand {
    /// Pages whose period ended at or before this instant are expired.
    pub as_of: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpireCancelledSubscriptionsResult {
    /// Pages moved to `cancelled`.
    pub expired: Vec<PageId>,

    /// Pages changed by another writer mid-sweep; the next run retries them.
    pub skipped: Vec<PageId>,
}

pub struct ExpireCancelledSubscriptionsHandler {
    pages: Arc<dyn PageRepository>,
}

impl ExpireCancelledSubscriptionsHandler {
    pub fn new(pages: Arc<dyn PageRepository>) -> Self {
        Self { pages }
    }

    pub async fn handle(
        &self,
        cmd: ExpireCancelledSubscriptionsCommand,
    ) -> Result<ExpireCancelledSubscriptionsResult, BillingError> {
        let due = self.pages.find_cancelling_due(cmd.as_of).await?;
        let mut result = ExpireCancelledSubscriptionsResult::default();

        for page in due {
            match self.expire(&page, cmd.as_of).await {
                Ok(()) => result.expired.push(page.page_id),
                Err(BillingError::Conflict(reason)) => {
                    tracing::info!(page_id = %page.page_id, reason = %reason, "Expiry skipped");
                    result.skipped.push(page.page_id);
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            expired = result.expired.len(),
            skipped = result.skipped.len(),
            "Cancelled subscriptions expired"
        );
        Ok(result)
    }

    async fn expire(&self, page: &PageSubscription, as_of: Timestamp) -> Result<(), BillingError> {
        let provider = page.provider.ok_or_else(|| {
            BillingError::infrastructure(format!("cancelling page {} has no provider", page.page_id))
        })?;

        let now = as_of.as_unix_secs();
        let sequence = page.last_event_sequence.map_or(now, |last| last.max(now));
        let event = SubscriptionEvent::new(
            format!("period_end_{}", uuid::Uuid::new_v4()),
            sequence,
            provider,
            BillingEvent::PeriodEndReached,
        );

        let updated = match apply_subscription_event(page, &event)? {
            TransitionOutcome::Applied(updated) => updated,
            TransitionOutcome::AlreadyApplied => return Ok(()),
        };
        let stored = self.pages.update_if_version(&updated, page.version).await?;

        tracing::info!(
            page_id = %stored.page_id,
            provider = %provider,
            period_end = ?page.current_period_end,
            "Subscription period ended"
        );
        Ok(())
    }
}
