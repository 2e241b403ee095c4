//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers (checkout, cancel, webhooks, code creation) write;
//! query handlers (subscription view, code validation, listing) only read.

mod gateways;
pub mod handlers;

pub use gateways::PaymentGateways;
pub use handlers::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
    CreateDiscountCodeCommand, CreateDiscountCodeHandler, ExpireCancelledSubscriptionsCommand,
    ExpireCancelledSubscriptionsHandler, ExpireCancelledSubscriptionsResult, GetSubscriptionHandler,
    GetSubscriptionQuery, HandleProviderWebhookCommand, HandleProviderWebhookHandler,
    HandleProviderWebhookResult, ListDiscountCodesHandler, StartCheckoutCommand,
    StartCheckoutHandler, StartCheckoutResult, SubscriptionView, UpdateUserPlanCommand,
    UpdateUserPlanHandler, UpdateUserPlanResult, ValidateDiscountCodeHandler,
    ValidateDiscountCodeQuery, ValidateDiscountCodeResult,
};
