//! Discount code repository port.
//!
//! Redemptions are keyed by checkout session so a provider retrying the
//! same completion webhook never counts a code twice.

use async_trait::async_trait;

use crate::domain::discount::{DiscountCode, NormalizedCode};
use crate::domain::foundation::DomainError;

/// Result of recording a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionOutcome {
    /// Count incremented for this checkout session.
    Recorded,
    /// This checkout session was already counted.
    AlreadyRecorded,
    /// Counted, but the code had already hit `max_redemptions`. The
    /// customer paid with it, so the use still counts.
    RecordedOverLimit,
}

#[async_trait]
pub trait DiscountCodeRepository: Send + Sync {
    /// All codes, newest first.
    async fn list_all(&self) -> Result<Vec<DiscountCode>, DomainError>;

    /// Case-insensitive exact lookup.
    async fn find_by_code(&self, code: &NormalizedCode)
        -> Result<Option<DiscountCode>, DomainError>;

    /// Insert a new code.
    ///
    /// # Errors
    ///
    /// - `DiscountCodeExists` if the code text is taken
    /// - `DatabaseError` on persistence failure
    async fn create(&self, code: &DiscountCode) -> Result<(), DomainError>;

    /// Count one redemption of `code` for `checkout_session_id`. A use past
    /// the limit is still counted and reported as `RecordedOverLimit`.
    ///
    /// # Errors
    ///
    /// - `DiscountCodeNotFound` if the code doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn record_redemption(
        &self,
        code: &NormalizedCode,
        checkout_session_id: &str,
    ) -> Result<RedemptionOutcome, DomainError>;
}
