//! In-memory discount code repository.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::discount::{DiscountCode, NormalizedCode};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{DiscountCodeRepository, RedemptionOutcome};

#[derive(Default)]
struct State {
    /// Keyed by upper-case code.
    codes: HashMap<String, DiscountCode>,
    /// (code, checkout session) pairs already counted.
    redemptions: HashSet<(String, String)>,
}

#[derive(Default)]
pub struct InMemoryDiscountCodeRepository {
    state: RwLock<State>,
}

impl InMemoryDiscountCodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a code without validation, for seeding fixtures.
    pub async fn insert(&self, code: DiscountCode) {
        let key = code.code.to_uppercase();
        self.state.write().await.codes.insert(key, code);
    }
}

#[async_trait]
impl DiscountCodeRepository for InMemoryDiscountCodeRepository {
    async fn list_all(&self) -> Result<Vec<DiscountCode>, DomainError> {
        let mut codes: Vec<DiscountCode> =
            self.state.read().await.codes.values().cloned().collect();
        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(codes)
    }

    async fn find_by_code(
        &self,
        code: &NormalizedCode,
    ) -> Result<Option<DiscountCode>, DomainError> {
        Ok(self.state.read().await.codes.get(code.as_str()).cloned())
    }

    async fn create(&self, code: &DiscountCode) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let key = code.code.to_uppercase();
        if state.codes.contains_key(&key) {
            return Err(DomainError::new(
                ErrorCode::DiscountCodeExists,
                format!("discount code {} already exists", key),
            ));
        }
        state.codes.insert(key, code.clone());
        Ok(())
    }

    async fn record_redemption(
        &self,
        code: &NormalizedCode,
        checkout_session_id: &str,
    ) -> Result<RedemptionOutcome, DomainError> {
        let mut state = self.state.write().await;
        let key = (code.as_str().to_string(), checkout_session_id.to_string());

        if state.redemptions.contains(&key) {
            return Ok(RedemptionOutcome::AlreadyRecorded);
        }

        let stored = state.codes.get_mut(code.as_str()).ok_or_else(|| {
            DomainError::new(ErrorCode::DiscountCodeNotFound, code.as_str())
        })?;

        let over_limit = stored.limit_reached();
        stored.redemption_count += 1;
        state.redemptions.insert(key);

        Ok(if over_limit {
            RedemptionOutcome::RecordedOverLimit
        } else {
            RedemptionOutcome::Recorded
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::discount::{DiscountType, NewDiscountCode};
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::SubscriptionPlan;

    fn code(text: &str, max: Option<i64>) -> DiscountCode {
        DiscountCode::create(
            NewDiscountCode {
                code: text.to_string(),
                description: None,
                discount_type: DiscountType::Percentage,
                discount_value: 10,
                applicable_plans: vec![SubscriptionPlan::Pro],
                max_redemptions: max,
                expires_at: None,
                active: true,
            },
            Timestamp::now(),
        )
        .unwrap()
    }

    fn key(text: &str) -> NormalizedCode {
        NormalizedCode::for_lookup(text).unwrap()
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let repo = InMemoryDiscountCodeRepository::new();
        repo.create(&code("SPRING", None)).await.unwrap();

        let err = repo.create(&code("spring", None)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DiscountCodeExists);
    }

    #[tokio::test]
    async fn redemption_is_idempotent_per_session() {
        let repo = InMemoryDiscountCodeRepository::new();
        repo.create(&code("SPRING", None)).await.unwrap();

        let first = repo.record_redemption(&key("spring"), "cs_1").await.unwrap();
        let again = repo.record_redemption(&key("spring"), "cs_1").await.unwrap();
        let other = repo.record_redemption(&key("spring"), "cs_2").await.unwrap();

        assert_eq!(first, RedemptionOutcome::Recorded);
        assert_eq!(again, RedemptionOutcome::AlreadyRecorded);
        assert_eq!(other, RedemptionOutcome::Recorded);

        let stored = repo.find_by_code(&key("SPRING")).await.unwrap().unwrap();
        assert_eq!(stored.redemption_count, 2);
    }

    #[tokio::test]
    async fn redemption_past_limit_is_still_counted() {
        let repo = InMemoryDiscountCodeRepository::new();
        repo.create(&code("ONCE", Some(1))).await.unwrap();

        let first = repo.record_redemption(&key("once"), "cs_1").await.unwrap();
        let second = repo.record_redemption(&key("once"), "cs_2").await.unwrap();
        let replay = repo.record_redemption(&key("once"), "cs_2").await.unwrap();

        assert_eq!(first, RedemptionOutcome::Recorded);
        assert_eq!(second, RedemptionOutcome::RecordedOverLimit);
        assert_eq!(replay, RedemptionOutcome::AlreadyRecorded);

        let stored = repo.find_by_code(&key("ONCE")).await.unwrap().unwrap();
        assert_eq!(stored.redemption_count, 2);
        assert!(stored.limit_reached());
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let repo = InMemoryDiscountCodeRepository::new();
        let err = repo.record_redemption(&key("nope"), "cs_1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DiscountCodeNotFound);
    }
}
