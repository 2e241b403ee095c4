//! Page subscription handlers.

mod cancel_subscription;
mod expire_cancelled_subscriptions;
mod get_subscription;
mod handle_provider_webhook;
mod start_checkout;

pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use expire_cancelled_subscriptions::{
    ExpireCancelledSubscriptionsCommand, ExpireCancelledSubscriptionsHandler,
    ExpireCancelledSubscriptionsResult,
};
pub use get_subscription::{GetSubscriptionHandler, GetSubscriptionQuery, SubscriptionView};
pub use handle_provider_webhook::{
    HandleProviderWebhookCommand, HandleProviderWebhookHandler, HandleProviderWebhookResult,
};
pub use start_checkout::{StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult};
