//! Request and response bodies for page subscription routes.

use serde::{Deserialize, Serialize};

use crate::application::handlers::StartCheckoutResult;
use crate::domain::discount::AppliedDiscount;
use crate::domain::subscription::{ProviderKind, SubscriptionPlan};

#[derive(Debug, Clone, Deserialize)]
pub struct StartCheckoutRequest {
    /// `start` or `pro`.
    pub plan: String,
    #[serde(default)]
    pub discount_code: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelSubscriptionRequest {
    /// End now instead of at the close of the paid period.
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub provider: ProviderKind,
    pub session_id: String,
    pub checkout_url: String,
    pub plan: SubscriptionPlan,
    pub currency: String,
    /// Plan price in minor units.
    pub base_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<AppliedDiscount>,
    /// First charge in minor units.
    pub amount_due: i64,
}

impl CheckoutResponse {
    pub fn new(plan: SubscriptionPlan, result: StartCheckoutResult) -> Self {
        Self {
            provider: result.provider,
            session_id: result.session_id,
            checkout_url: result.checkout_url,
            plan,
            currency: result.price.currency,
            base_price: result.price.amount,
            discount: result.discount,
            amount_due: result.amount_due,
        }
    }
}
