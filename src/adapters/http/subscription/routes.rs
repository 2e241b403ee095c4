//! Router for page subscription endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::super::state::BillingAppState;
use super::handlers::{
    cancel_subscription, expire_cancelled_subscriptions, get_subscription, start_checkout,
};

/// Page subscription routes, mounted under `/api/pages`.
///
/// All routes require an authenticated page owner.
/// - `GET /:page_id/subscription` - current plan and state
/// - `POST /:page_id/subscription/checkout` - start a provider checkout
/// - `POST /:page_id/subscription/cancel` - cancel now or at period end
pub fn subscription_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/:page_id/subscription", get(get_subscription))
        .route("/:page_id/subscription/checkout", post(start_checkout))
        .route("/:page_id/subscription/cancel", post(cancel_subscription))
}

/// Admin subscription routes, mounted under `/api/admin/subscriptions`.
///
/// - `POST /expire-cancelled` - end cancelled subscriptions past their period
pub fn admin_subscription_routes() -> Router<BillingAppState> {
    Router::new().route("/expire-cancelled", post(expire_cancelled_subscriptions))
}
