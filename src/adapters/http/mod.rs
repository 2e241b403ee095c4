//! HTTP adapter - REST API for page billing.
//!
//! Routes are grouped by concern and share one `BillingAppState`. Caller
//! identity comes from the `X-User-Id` header set by the upstream auth proxy.

mod auth;
mod error;
mod state;

pub mod discount;
pub mod legacy;
pub mod subscription;
pub mod webhooks;

use axum::routing::get;
use axum::Router;

pub use auth::{AdminUser, AuthenticatedUser, USER_ID_HEADER};
pub use error::{ApiError, ErrorResponse};
pub use state::BillingAppState;

/// Creates the complete billing router.
///
/// # Routes
///
/// - `/api/pages/:page_id/subscription[/checkout|/cancel]` - page owners
/// - `/api/discount-codes/validate` - signed-in users
/// - `/api/admin/discount-codes` - admins
/// - `/api/admin/subscriptions/expire-cancelled` - admins, ends lapsed cancellations
/// - `/api/webhooks/{stripe,mollie}` - providers, authenticated by the gateway
/// - `/api/subscription/update` - deprecated, always 410
/// - `/health` - liveness
pub fn billing_router(state: BillingAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/pages", subscription::subscription_routes())
        .nest("/api/discount-codes", discount::discount_routes())
        .nest("/api/admin/discount-codes", discount::admin_discount_routes())
        .nest(
            "/api/admin/subscriptions",
            subscription::admin_subscription_routes(),
        )
        .nest("/api/webhooks", webhooks::webhook_routes())
        .nest("/api/subscription", legacy::legacy_routes())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
