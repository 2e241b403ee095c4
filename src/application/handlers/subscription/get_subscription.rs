//! GetSubscriptionHandler - Query handler for a page's subscription.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::foundation::{PageId, Timestamp, UserId};
use crate::domain::subscription::{
    BillingError, PageSubscription, ProviderKind, SubscriptionPlan, SubscriptionStatus,
};
use crate::ports::PageRepository;

#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub user_id: UserId,
    pub page_id: PageId,
}

/// Subscription summary shown to the page owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    pub page_id: PageId,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,

    /// Lifecycle state name (`free`, `active`, `cancelling`, `lapsed`, `cancelled`).
    pub state: &'static str,

    pub provider: Option<ProviderKind>,
    pub cancel_at_period_end: bool,

    /// When a pending cancellation takes effect, if known.
    pub current_period_end: Option<Timestamp>,

    /// Whether paid features are currently unlocked.
    pub has_access: bool,
}

impl SubscriptionView {
    pub fn from_page(page: &PageSubscription) -> Result<Self, BillingError> {
        let phase = page.state()?.phase();
        Ok(Self {
            page_id: page.page_id,
            plan: page.plan,
            status: page.status,
            state: phase.as_str(),
            provider: page.provider,
            cancel_at_period_end: page.cancel_at_period_end,
            current_period_end: page.current_period_end,
            has_access: phase.has_access(),
        })
    }
}

pub struct GetSubscriptionHandler {
    pages: Arc<dyn PageRepository>,
}

impl GetSubscriptionHandler {
    pub fn new(pages: Arc<dyn PageRepository>) -> Self {
        Self { pages }
    }

    pub async fn handle(&self, query: GetSubscriptionQuery) -> Result<SubscriptionView, BillingError> {
        let page = self
            .pages
            .find_by_id(&query.page_id)
            .await?
            .ok_or_else(|| BillingError::not_found("page", query.page_id))?;

        if !page.is_owned_by(&query.user_id) {
            return Err(BillingError::forbidden("only the page owner can view billing"));
        }

        SubscriptionView::from_page(&page)
    }
}
