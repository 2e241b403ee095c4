//! Plan prices.

use serde::{Deserialize, Serialize};

use super::SubscriptionPlan;

/// Recurring price of a paid plan in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPrice {
    pub amount: i64,
    /// ISO 4217 code, upper-case.
    pub currency: String,
}

/// Price list for the paid plans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    pub start: PlanPrice,
    pub pro: PlanPrice,
}

impl PlanCatalog {
    /// Returns the price for `plan`, or `None` for the free plan.
    pub fn price_for(&self, plan: SubscriptionPlan) -> Option<&PlanPrice> {
        match plan {
            SubscriptionPlan::Free => None,
            SubscriptionPlan::Start => Some(&self.start),
            SubscriptionPlan::Pro => Some(&self.pro),
        }
    }
}
