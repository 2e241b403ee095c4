//! Discount code entity.
//!
//! # Design Decisions
//!
//! - **Money in minor units**: fixed amounts are i64 cents, never floats
//! - **Active is independent**: a code can be switched off regardless of
//!   expiry or remaining redemptions
//! - **Read-only evaluation**: `redemption_count` only moves when the store
//!   records a redemption for a checkout session

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DiscountCodeId, Timestamp, ValidationError};
use crate::domain::subscription::SubscriptionPlan;

use super::NormalizedCode;

/// How `discount_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Whole percent of the base price.
    Percentage,
    /// Minor currency units off the base price.
    FixedAmount,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::FixedAmount => "fixed_amount",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed_amount" => Ok(DiscountType::FixedAmount),
            other => Err(ValidationError::invalid_format(
                "discount_type",
                format!("unknown discount type '{}'", other),
            )),
        }
    }
}

/// A stored discount code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    pub id: DiscountCodeId,

    /// Upper-case code text.
    pub code: String,

    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub applicable_plans: Vec<SubscriptionPlan>,
    pub max_redemptions: Option<i64>,
    pub redemption_count: i64,
    pub expires_at: Option<Timestamp>,
    pub active: bool,
    pub created_at: Timestamp,
}

/// Admin input for a new discount code.
#[derive(Debug, Clone)]
pub struct NewDiscountCode {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub applicable_plans: Vec<SubscriptionPlan>,
    pub max_redemptions: Option<i64>,
    pub expires_at: Option<Timestamp>,
    pub active: bool,
}

impl DiscountCode {
    /// Validates admin input and builds a code with zero redemptions.
    ///
    /// # Errors
    ///
    /// - malformed code text
    /// - percentage outside 1-100, or a non-positive fixed amount
    /// - empty plan set, or the free plan among them
    /// - `max_redemptions` below 1
    /// - `expires_at` not in the future
    pub fn create(input: NewDiscountCode, now: Timestamp) -> Result<Self, ValidationError> {
        let code = NormalizedCode::try_new(&input.code)?;

        match input.discount_type {
            DiscountType::Percentage if !(1..=100).contains(&input.discount_value) => {
                return Err(ValidationError::out_of_range(
                    "discount_value",
                    1,
                    100,
                    input.discount_value,
                ));
            }
            DiscountType::FixedAmount if input.discount_value <= 0 => {
                return Err(ValidationError::out_of_range(
                    "discount_value",
                    1,
                    i64::MAX,
                    input.discount_value,
                ));
            }
            _ => {}
        }

        if input.applicable_plans.is_empty() {
            return Err(ValidationError::empty_field("applicable_plans"));
        }
        if input.applicable_plans.iter().any(|p| !p.is_paid()) {
            return Err(ValidationError::invalid_format(
                "applicable_plans",
                "the free plan cannot be discounted",
            ));
        }

        let mut plans = input.applicable_plans;
        plans.sort_by_key(|p| p.as_str());
        plans.dedup();

        if let Some(max) = input.max_redemptions {
            if max < 1 {
                return Err(ValidationError::out_of_range("max_redemptions", 1, i64::MAX, max));
            }
        }

        if let Some(expires_at) = input.expires_at {
            if !expires_at.is_after(&now) {
                return Err(ValidationError::invalid_format(
                    "expires_at",
                    "must be in the future",
                ));
            }
        }

        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id: DiscountCodeId::new(),
            code: code.as_str().to_string(),
            description,
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            applicable_plans: plans,
            max_redemptions: input.max_redemptions,
            redemption_count: 0,
            expires_at: input.expires_at,
            active: input.active,
            created_at: now,
        })
    }

    pub fn applies_to(&self, plan: SubscriptionPlan) -> bool {
        self.applicable_plans.contains(&plan)
    }

    /// A code expires at `expires_at`; the instant itself is already expired.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.map_or(false, |at| !now.is_before(&at))
    }

    pub fn limit_reached(&self) -> bool {
        self.max_redemptions
            .map_or(false, |max| self.redemption_count >= max)
    }

    /// Amount taken off `base_price`, never more than `base_price` and never
    /// negative.
    pub fn effective_discount(&self, base_price: i64) -> i64 {
        let base = base_price.max(0);
        let value = self.discount_value.max(0);
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let amount = i128::from(base) * i128::from(value) / 100;
                i64::try_from(amount).unwrap_or(i64::MAX)
            }
            DiscountType::FixedAmount => value,
        };
        raw.min(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewDiscountCode {
        NewDiscountCode {
            code: "launch".to_string(),
            description: Some("  Launch week  ".to_string()),
            discount_type: DiscountType::Percentage,
            discount_value: 20,
            applicable_plans: vec![SubscriptionPlan::Pro, SubscriptionPlan::Start],
            max_redemptions: Some(100),
            expires_at: None,
            active: true,
        }
    }

    fn code_with(discount_type: DiscountType, value: i64) -> DiscountCode {
        let mut new = input();
        new.discount_type = discount_type;
        new.discount_value = 1;
        let mut code = DiscountCode::create(new, Timestamp::now()).unwrap();
        code.discount_value = value;
        code
    }

    #[test]
    fn create_normalizes_code_and_description() {
        let code = DiscountCode::create(input(), Timestamp::now()).unwrap();
        assert_eq!(code.code, "LAUNCH");
        assert_eq!(code.description.as_deref(), Some("Launch week"));
        assert_eq!(code.redemption_count, 0);
    }

    #[test]
    fn create_rejects_percentage_over_hundred() {
        let mut new = input();
        new.discount_value = 150;
        assert!(matches!(
            DiscountCode::create(new, Timestamp::now()),
            Err(ValidationError::OutOfRange { actual: 150, .. })
        ));
    }

    #[test]
    fn create_rejects_zero_fixed_amount() {
        let mut new = input();
        new.discount_type = DiscountType::FixedAmount;
        new.discount_value = 0;
        assert!(DiscountCode::create(new, Timestamp::now()).is_err());
    }

    #[test]
    fn create_rejects_free_plan_and_empty_plans() {
        let mut with_free = input();
        with_free.applicable_plans = vec![SubscriptionPlan::Free];
        assert!(DiscountCode::create(with_free, Timestamp::now()).is_err());

        let mut empty = input();
        empty.applicable_plans.clear();
        assert!(matches!(
            DiscountCode::create(empty, Timestamp::now()),
            Err(ValidationError::EmptyField { .. })
        ));
    }

    #[test]
    fn create_rejects_past_expiry() {
        let now = Timestamp::now();
        let mut new = input();
        new.expires_at = Some(now.add_days(-1));
        assert!(DiscountCode::create(new, now).is_err());
    }

    #[test]
    fn create_deduplicates_plans() {
        let mut new = input();
        new.applicable_plans = vec![SubscriptionPlan::Pro, SubscriptionPlan::Pro];
        let code = DiscountCode::create(new, Timestamp::now()).unwrap();
        assert_eq!(code.applicable_plans, vec![SubscriptionPlan::Pro]);
    }

    #[test]
    fn percentage_is_capped_at_base_price() {
        assert_eq!(code_with(DiscountType::Percentage, 150).effective_discount(10), 10);
        assert_eq!(code_with(DiscountType::Percentage, 25).effective_discount(1000), 250);
    }

    #[test]
    fn fixed_amount_is_capped_at_base_price() {
        assert_eq!(code_with(DiscountType::FixedAmount, 15).effective_discount(10), 10);
        assert_eq!(code_with(DiscountType::FixedAmount, 300).effective_discount(1000), 300);
    }

    #[test]
    fn percentage_rounds_down_to_whole_cents() {
        assert_eq!(code_with(DiscountType::Percentage, 33).effective_discount(999), 329);
    }

    #[test]
    fn expiry_instant_counts_as_expired() {
        let now = Timestamp::now();
        let mut code = code_with(DiscountType::Percentage, 10);
        code.expires_at = Some(now);
        assert!(code.is_expired(now));
        code.expires_at = Some(now.add_days(1));
        assert!(!code.is_expired(now));
    }

    #[test]
    fn limit_reached_when_count_meets_max() {
        let mut code = code_with(DiscountType::Percentage, 10);
        code.max_redemptions = Some(3);
        code.redemption_count = 2;
        assert!(!code.limit_reached());
        code.redemption_count = 3;
        assert!(code.limit_reached());
        code.max_redemptions = None;
        assert!(!code.limit_reached());
    }
}
