//! In-memory page repository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, PageId, Timestamp};
use crate::domain::subscription::{PageSubscription, ProviderKind};
use crate::ports::PageRepository;

/// Page store backed by a map. Used by tests and local development.
#[derive(Default)]
pub struct InMemoryPageRepository {
    pages: RwLock<HashMap<PageId, PageSubscription>>,
}

impl InMemoryPageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a page, as the page editor would on creation.
    pub async fn insert(&self, page: PageSubscription) {
        self.pages.write().await.insert(page.page_id, page);
    }

    pub async fn get(&self, id: &PageId) -> Option<PageSubscription> {
        self.pages.read().await.get(id).cloned()
    }
}

#[async_trait]
impl PageRepository for InMemoryPageRepository {
    async fn find_by_id(&self, id: &PageId) -> Result<Option<PageSubscription>, DomainError> {
        Ok(self.pages.read().await.get(id).cloned())
    }

    async fn find_by_provider_subscription_id(
        &self,
        provider: ProviderKind,
        subscription_id: &str,
    ) -> Result<Option<PageSubscription>, DomainError> {
        let pages = self.pages.read().await;
        Ok(pages
            .values()
            .find(|p| {
                p.provider == Some(provider)
                    && p.provider_subscription_id.as_deref() == Some(subscription_id)
            })
            .cloned())
    }

    async fn find_cancelling_due(
        &self,
        as_of: Timestamp,
    ) -> Result<Vec<PageSubscription>, DomainError> {
        let pages = self.pages.read().await;
        let mut due: Vec<PageSubscription> = pages
            .values()
            .filter(|p| p.is_cancelling_due(&as_of))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.current_period_end);
        Ok(due)
    }

    async fn update_if_version(
        &self,
        page: &PageSubscription,
        expected_version: i64,
    ) -> Result<PageSubscription, DomainError> {
        let mut pages = self.pages.write().await;
        let stored = pages.get_mut(&page.page_id).ok_or_else(|| {
            DomainError::new(ErrorCode::PageNotFound, page.page_id.to_string())
        })?;

        if stored.version != expected_version {
            return Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                format!(
                    "page {} changed: expected version {}, found {}",
                    page.page_id, expected_version, stored.version
                ),
            ));
        }

        let mut updated = page.clone();
        updated.version = expected_version + 1;
        *stored = updated.clone();
        Ok(updated)
    }
}
