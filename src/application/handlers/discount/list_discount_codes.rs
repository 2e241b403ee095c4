//! ListDiscountCodesHandler - Admin listing of all discount codes.

use std::sync::Arc;

use crate::domain::discount::DiscountCode;
use crate::domain::subscription::BillingError;
use crate::ports::DiscountCodeRepository;

pub struct ListDiscountCodesHandler {
    discount_codes: Arc<dyn DiscountCodeRepository>,
}

impl ListDiscountCodesHandler {
    pub fn new(discount_codes: Arc<dyn DiscountCodeRepository>) -> Self {
        Self { discount_codes }
    }

    /// All codes, newest first.
    pub async fn handle(&self) -> Result<Vec<DiscountCode>, BillingError> {
        Ok(self.discount_codes.list_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDiscountCodeRepository;
    use crate::domain::discount::{DiscountType, NewDiscountCode};
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::SubscriptionPlan;

    #[tokio::test]
    async fn lists_newest_first() {
        let repo = Arc::new(InMemoryDiscountCodeRepository::new());
        for (text, days) in [("OLDER", 1), ("NEWER", 2)] {
            let code = DiscountCode::create(
                NewDiscountCode {
                    code: text.to_string(),
                    description: None,
                    discount_type: DiscountType::FixedAmount,
                    discount_value: 100,
                    applicable_plans: vec![SubscriptionPlan::Start],
                    max_redemptions: None,
                    expires_at: None,
                    active: true,
                },
                Timestamp::now().add_days(days),
            )
            .unwrap();
            repo.insert(code).await;
        }

        let codes = ListDiscountCodesHandler::new(repo).handle().await.unwrap();

        let names: Vec<&str> = codes.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(names, vec!["NEWER", "OLDER"]);
    }
}
