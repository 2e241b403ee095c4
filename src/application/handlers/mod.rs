//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod discount;
pub mod legacy;
pub mod subscription;

pub use discount::{
    CreateDiscountCodeCommand, CreateDiscountCodeHandler, ListDiscountCodesHandler,
    ValidateDiscountCodeHandler, ValidateDiscountCodeQuery, ValidateDiscountCodeResult,
};
pub use legacy::{UpdateUserPlanCommand, UpdateUserPlanHandler, UpdateUserPlanResult};
pub use subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
    ExpireCancelledSubscriptionsCommand, ExpireCancelledSubscriptionsHandler,
    ExpireCancelledSubscriptionsResult, GetSubscriptionHandler, GetSubscriptionQuery,
    HandleProviderWebhookCommand,
    HandleProviderWebhookHandler, HandleProviderWebhookResult, StartCheckoutCommand,
    StartCheckoutHandler, StartCheckoutResult, SubscriptionView,
};
