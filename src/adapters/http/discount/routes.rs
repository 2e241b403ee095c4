//! Routers for discount code endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::super::state::BillingAppState;
use super::handlers::{create_discount_code, list_discount_codes, validate_discount_code};

/// Customer-facing routes, mounted under `/api/discount-codes`.
/// - `POST /validate` - evaluate a code for a plan
pub fn discount_routes() -> Router<BillingAppState> {
    Router::new().route("/validate", post(validate_discount_code))
}

/// Admin routes, mounted under `/api/admin/discount-codes`.
/// - `GET /` - list every code, newest first
/// - `POST /` - create a code
pub fn admin_discount_routes() -> Router<BillingAppState> {
    Router::new().route("/", get(list_discount_codes).post(create_discount_code))
}
