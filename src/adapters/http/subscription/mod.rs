//! HTTP adapter for page subscriptions.

mod dto;
mod handlers;
mod routes;

pub use dto::{CancelSubscriptionRequest, CheckoutResponse, StartCheckoutRequest};
pub use routes::{admin_subscription_routes, subscription_routes};
