//! Page repository port.
//!
//! Reads and conditionally updates the subscription columns of a page.
//! Page creation and deletion belong to the page editor and are not part
//! of this contract.
//!
//! # Concurrency
//!
//! Concurrent webhook deliveries for one page serialize through
//! `update_if_version`: the write only lands if the stored version still
//! matches the one the caller read.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PageId, Timestamp};
use crate::domain::subscription::{PageSubscription, ProviderKind};

#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Find a page's subscription columns by page id.
    async fn find_by_id(&self, id: &PageId) -> Result<Option<PageSubscription>, DomainError>;

    /// Find the page owning a provider subscription.
    async fn find_by_provider_subscription_id(
        &self,
        provider: ProviderKind,
        subscription_id: &str,
    ) -> Result<Option<PageSubscription>, DomainError>;

    /// Pages cancelled at period end whose `current_period_end` is at or
    /// before `as_of`, oldest first.
    async fn find_cancelling_due(
        &self,
        as_of: Timestamp,
    ) -> Result<Vec<PageSubscription>, DomainError>;

    /// Write plan, status, cancel flag, period end, provider reference and event
    /// bookkeeping in one statement, if the stored version equals
    /// `expected_version`.
    ///
    /// Returns the stored page with its bumped version.
    ///
    /// # Errors
    ///
    /// - `PageNotFound` if the page doesn't exist
    /// - `ConcurrentModification` if the version moved
    /// - `DatabaseError` on persistence failure
    async fn update_if_version(
        &self,
        page: &PageSubscription,
        expected_version: i64,
    ) -> Result<PageSubscription, DomainError>;
}
