//! CreateDiscountCodeHandler - Admin creation of discount codes.

use std::sync::Arc;

use crate::domain::discount::{DiscountCode, NewDiscountCode, NormalizedCode};
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::BillingError;
use crate::ports::DiscountCodeRepository;

#[derive(Debug, Clone)]
pub struct CreateDiscountCodeCommand {
    pub input: NewDiscountCode,
}

pub struct CreateDiscountCodeHandler {
    discount_codes: Arc<dyn DiscountCodeRepository>,
}

impl CreateDiscountCodeHandler {
    pub fn new(discount_codes: Arc<dyn DiscountCodeRepository>) -> Self {
        Self { discount_codes }
    }

    pub async fn handle(&self, cmd: CreateDiscountCodeCommand) -> Result<DiscountCode, BillingError> {
        let code = DiscountCode::create(cmd.input, Timestamp::now())?;

        let lookup = NormalizedCode::for_lookup(&code.code)?;
        if self.discount_codes.find_by_code(&lookup).await?.is_some() {
            return Err(BillingError::conflict(format!(
                "discount code {} already exists",
                code.code
            )));
        }

        // The store's unique index still catches a concurrent create.
        self.discount_codes.create(&code).await?;

        tracing::info!(
            code = %code.code,
            discount_type = code.discount_type.as_str(),
            discount_value = code.discount_value,
            "Discount code created"
        );

        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDiscountCodeRepository;
    use crate::domain::discount::DiscountType;
    use crate::domain::subscription::SubscriptionPlan;

    fn input(code: &str) -> NewDiscountCode {
        NewDiscountCode {
            code: code.to_string(),
            description: Some("Spring sale".to_string()),
            discount_type: DiscountType::Percentage,
            discount_value: 25,
            applicable_plans: vec![SubscriptionPlan::Pro, SubscriptionPlan::Start],
            max_redemptions: Some(100),
            expires_at: None,
            active: true,
        }
    }

    fn handler() -> (CreateDiscountCodeHandler, Arc<InMemoryDiscountCodeRepository>) {
        let repo = Arc::new(InMemoryDiscountCodeRepository::new());
        (CreateDiscountCodeHandler::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn creates_normalized_code() {
        let (handler, repo) = handler();

        let code = handler
            .handle(CreateDiscountCodeCommand {
                input: input("spring-25"),
            })
            .await
            .unwrap();

        assert_eq!(code.code, "SPRING-25");
        assert_eq!(code.redemption_count, 0);
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_is_conflict() {
        let (handler, _) = handler();
        handler
            .handle(CreateDiscountCodeCommand {
                input: input("SPRING"),
            })
            .await
            .unwrap();

        let err = handler
            .handle(CreateDiscountCodeCommand {
                input: input("spring"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Conflict(_)));
    }

    #[tokio::test]
    async fn out_of_range_percentage_is_invalid() {
        let (handler, repo) = handler();
        let mut bad = input("TOOMUCH");
        bad.discount_value = 150;

        let err = handler
            .handle(CreateDiscountCodeCommand { input: bad })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidInput { .. }));
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn free_plan_is_rejected() {
        let (handler, _) = handler();
        let mut bad = input("FREEBIE");
        bad.applicable_plans = vec![SubscriptionPlan::Free];

        let err = handler
            .handle(CreateDiscountCodeCommand { input: bad })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidInput { .. }));
    }
}
