//! ValidateDiscountCodeHandler - Checks a code against a plan price.

use std::sync::Arc;

use crate::domain::discount::{evaluate_discount_code, DiscountDecision, NormalizedCode};
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{BillingError, PlanCatalog, SubscriptionPlan};
use crate::ports::DiscountCodeRepository;

#[derive(Debug, Clone)]
pub struct ValidateDiscountCodeQuery {
    pub code: String,

    /// Plan name as sent by the client.
    pub plan: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateDiscountCodeResult {
    pub plan: SubscriptionPlan,
    pub currency: String,
    pub base_price: i64,
    pub decision: DiscountDecision,
}

/// Read-only check used by the checkout form. Never redeems.
pub struct ValidateDiscountCodeHandler {
    discount_codes: Arc<dyn DiscountCodeRepository>,
    catalog: PlanCatalog,
}

impl ValidateDiscountCodeHandler {
    pub fn new(discount_codes: Arc<dyn DiscountCodeRepository>, catalog: PlanCatalog) -> Self {
        Self {
            discount_codes,
            catalog,
        }
    }

    pub async fn handle(
        &self,
        query: ValidateDiscountCodeQuery,
    ) -> Result<ValidateDiscountCodeResult, BillingError> {
        let plan = SubscriptionPlan::parse_paid(&query.plan)?;
        let lookup = NormalizedCode::for_lookup(&query.code)?;

        let price = self
            .catalog
            .price_for(plan)
            .ok_or_else(|| BillingError::invalid_input("plan", "no price for plan"))?;

        let stored = self.discount_codes.find_by_code(&lookup).await?;
        let decision = evaluate_discount_code(
            &query.code,
            plan,
            price.amount,
            Timestamp::now(),
            stored.iter(),
        )?;

        tracing::debug!(
            code = %lookup.as_str(),
            plan = %plan,
            valid = decision.is_valid(),
            "Discount code evaluated"
        );

        Ok(ValidateDiscountCodeResult {
            plan,
            currency: price.currency.clone(),
            base_price: price.amount,
            decision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDiscountCodeRepository;
    use crate::domain::discount::{DiscountCode, DiscountType, InvalidReason, NewDiscountCode};
    use crate::domain::subscription::PlanPrice;

    fn catalog() -> PlanCatalog {
        PlanCatalog {
            start: PlanPrice {
                amount: 500,
                currency: "EUR".to_string(),
            },
            pro: PlanPrice {
                amount: 1200,
                currency: "EUR".to_string(),
            },
        }
    }

    async fn handler_with(codes: Vec<DiscountCode>) -> ValidateDiscountCodeHandler {
        let repo = Arc::new(InMemoryDiscountCodeRepository::new());
        for code in codes {
            repo.insert(code).await;
        }
        ValidateDiscountCodeHandler::new(repo, catalog())
    }

    fn code(text: &str, kind: DiscountType, value: i64) -> DiscountCode {
        DiscountCode::create(
            NewDiscountCode {
                code: text.to_string(),
                description: None,
                discount_type: kind,
                discount_value: value,
                applicable_plans: vec![SubscriptionPlan::Start, SubscriptionPlan::Pro],
                max_redemptions: None,
                expires_at: None,
                active: true,
            },
            Timestamp::now(),
        )
        .unwrap()
    }

    fn query(code: &str, plan: &str) -> ValidateDiscountCodeQuery {
        ValidateDiscountCodeQuery {
            code: code.to_string(),
            plan: plan.to_string(),
        }
    }

    #[tokio::test]
    async fn valid_code_reports_final_price() {
        let handler = handler_with(vec![code("TENOFF", DiscountType::FixedAmount, 1000)]).await;

        let result = handler.handle(query("tenoff", "start")).await.unwrap();

        assert_eq!(result.base_price, 500);
        assert_eq!(result.currency, "EUR");
        match result.decision {
            DiscountDecision::Valid(applied) => {
                assert_eq!(applied.effective_discount, 500);
                assert_eq!(applied.final_price, 0);
            }
            other => panic!("expected valid decision, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn inactive_code_reports_reason() {
        let mut stored = code("OLD", DiscountType::Percentage, 10);
        stored.active = false;
        let handler = handler_with(vec![stored]).await;

        let result = handler.handle(query("OLD", "pro")).await.unwrap();

        assert_eq!(
            result.decision,
            DiscountDecision::Invalid {
                reason: InvalidReason::Inactive
            }
        );
    }

    #[tokio::test]
    async fn unknown_code_is_not_found_decision() {
        let handler = handler_with(vec![]).await;

        let result = handler.handle(query("MISSING", "pro")).await.unwrap();

        assert_eq!(
            result.decision,
            DiscountDecision::Invalid {
                reason: InvalidReason::NotFound
            }
        );
    }

    #[tokio::test]
    async fn free_plan_is_invalid_input() {
        let handler = handler_with(vec![]).await;
        let err = handler.handle(query("ANY", "free")).await.unwrap_err();
        assert!(matches!(err, BillingError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn blank_code_is_invalid_input() {
        let handler = handler_with(vec![]).await;
        let err = handler.handle(query("  ", "pro")).await.unwrap_err();
        assert!(matches!(err, BillingError::InvalidInput { .. }));
    }
}
