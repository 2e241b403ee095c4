//! Shared router state.

use std::sync::Arc;

use crate::application::handlers::{
    CancelSubscriptionHandler, CreateDiscountCodeHandler, ExpireCancelledSubscriptionsHandler,
    GetSubscriptionHandler,
    HandleProviderWebhookHandler, ListDiscountCodesHandler, StartCheckoutHandler,
    UpdateUserPlanHandler, ValidateDiscountCodeHandler,
};
use crate::application::PaymentGateways;
use crate::domain::subscription::PlanCatalog;
use crate::ports::{DiscountCodeRepository, PageRepository, UserRepository, WebhookEventRepository};

/// Dependencies shared by every billing route.
///
/// Cloned per request; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct BillingAppState {
    pub pages: Arc<dyn PageRepository>,
    pub users: Arc<dyn UserRepository>,
    pub discount_codes: Arc<dyn DiscountCodeRepository>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub gateways: PaymentGateways,
    pub catalog: PlanCatalog,
}

impl BillingAppState {
    pub fn start_checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.pages.clone(),
            self.users.clone(),
            self.discount_codes.clone(),
            self.gateways.clone(),
            self.catalog.clone(),
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(self.pages.clone(), self.users.clone(), self.gateways.clone())
    }

    pub fn expire_cancelled_handler(&self) -> ExpireCancelledSubscriptionsHandler {
        ExpireCancelledSubscriptionsHandler::new(self.pages.clone())
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.pages.clone())
    }

    pub fn webhook_handler(&self) -> HandleProviderWebhookHandler {
        HandleProviderWebhookHandler::new(
            self.pages.clone(),
            self.discount_codes.clone(),
            self.webhook_events.clone(),
            self.gateways.clone(),
        )
    }

    pub fn validate_discount_handler(&self) -> ValidateDiscountCodeHandler {
        ValidateDiscountCodeHandler::new(self.discount_codes.clone(), self.catalog.clone())
    }

    pub fn create_discount_handler(&self) -> CreateDiscountCodeHandler {
        CreateDiscountCodeHandler::new(self.discount_codes.clone())
    }

    pub fn list_discounts_handler(&self) -> ListDiscountCodesHandler {
        ListDiscountCodesHandler::new(self.discount_codes.clone())
    }

    pub fn update_user_plan_handler(&self) -> UpdateUserPlanHandler {
        UpdateUserPlanHandler::new(self.users.clone())
    }
}
