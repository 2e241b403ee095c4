//! Request and response bodies for discount code routes.

use serde::{Deserialize, Serialize};

use crate::application::handlers::ValidateDiscountCodeResult;
use crate::domain::discount::{
    AppliedDiscount, DiscountCode, DiscountDecision, DiscountType, InvalidReason, NewDiscountCode,
};
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::SubscriptionPlan;

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateDiscountRequest {
    pub code: String,
    pub plan: String,
}

/// Evaluation result. `final_price` equals `base_price` when invalid.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateDiscountResponse {
    pub valid: bool,
    pub plan: SubscriptionPlan,
    pub currency: String,
    pub base_price: i64,
    pub final_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<AppliedDiscount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
}

impl From<ValidateDiscountCodeResult> for ValidateDiscountResponse {
    fn from(result: ValidateDiscountCodeResult) -> Self {
        let (final_price, discount, reason) = match result.decision {
            DiscountDecision::Valid(applied) => (applied.final_price, Some(applied), None),
            DiscountDecision::Invalid { reason } => (result.base_price, None, Some(reason)),
        };
        Self {
            valid: discount.is_some(),
            plan: result.plan,
            currency: result.currency,
            base_price: result.base_price,
            final_price,
            discount,
            reason,
        }
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDiscountRequest {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    /// Whole percent, or minor units for a fixed amount.
    pub discount_value: i64,
    pub applicable_plans: Vec<SubscriptionPlan>,
    #[serde(default)]
    pub max_redemptions: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl From<CreateDiscountRequest> for NewDiscountCode {
    fn from(request: CreateDiscountRequest) -> Self {
        NewDiscountCode {
            code: request.code,
            description: request.description,
            discount_type: request.discount_type,
            discount_value: request.discount_value,
            applicable_plans: request.applicable_plans,
            max_redemptions: request.max_redemptions,
            expires_at: request.expires_at,
            active: request.active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscountCodeListResponse {
    pub codes: Vec<DiscountCode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::discount::DiscountType;

    fn result(decision: DiscountDecision) -> ValidateDiscountCodeResult {
        ValidateDiscountCodeResult {
            plan: SubscriptionPlan::Pro,
            currency: "EUR".to_string(),
            base_price: 1200,
            decision,
        }
    }

    #[test]
    fn valid_decision_reports_discounted_price() {
        let response = ValidateDiscountResponse::from(result(DiscountDecision::Valid(
            AppliedDiscount {
                code: "HALF".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: 50,
                base_price: 1200,
                effective_discount: 600,
                final_price: 600,
            },
        )));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["final_price"], 600);
        assert_eq!(json["discount"]["effective_discount"], 600);
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn invalid_decision_reports_reason_and_full_price() {
        let response = ValidateDiscountResponse::from(result(DiscountDecision::Invalid {
            reason: InvalidReason::Expired,
        }));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["final_price"], 1200);
        assert_eq!(json["reason"], "expired");
        assert!(json.get("discount").is_none());
    }

    #[test]
    fn create_request_defaults_to_active() {
        let request: CreateDiscountRequest = serde_json::from_value(serde_json::json!({
            "code": "launch",
            "discount_type": "fixed_amount",
            "discount_value": 300,
            "applicable_plans": ["start", "pro"]
        }))
        .unwrap();

        let input = NewDiscountCode::from(request);
        assert!(input.active);
        assert_eq!(input.discount_type, DiscountType::FixedAmount);
        assert_eq!(input.applicable_plans.len(), 2);
    }
}
