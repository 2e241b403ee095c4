//! Router for provider webhooks, mounted under `/api/webhooks`.

use axum::routing::post;
use axum::Router;

use super::super::state::BillingAppState;
use super::handlers::{handle_mollie_webhook, handle_stripe_webhook};

/// - `POST /stripe` - signed Stripe events
/// - `POST /mollie` - Mollie payment status pings
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/stripe", post(handle_stripe_webhook))
        .route("/mollie", post(handle_mollie_webhook))
}
