//! Deprecated user-scoped plan endpoint.
//!
//! `POST /api/subscription/update` once wrote a plan onto the user. It now
//! answers 410 Gone and points at the page-scoped checkout route.

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::application::handlers::UpdateUserPlanCommand;
use crate::domain::subscription::SubscriptionPlan;

use super::auth::AuthenticatedUser;
use super::error::ApiError;
use super::state::BillingAppState;

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserPlanRequest {
    pub email: String,
    pub plan: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoneResponse {
    pub code: &'static str,
    pub message: String,
    pub requested_plan: SubscriptionPlan,
    pub replacement: &'static str,
}

/// POST /api/subscription/update
pub async fn update_user_plan(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Json(request): Json<UpdateUserPlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = UpdateUserPlanCommand {
        email: request.email,
        plan: request.plan,
    };
    let result = state.update_user_plan_handler().handle(cmd).await?;

    let body = GoneResponse {
        code: "GONE",
        message: "Plans are managed per page; use the page checkout route".to_string(),
        requested_plan: result.requested_plan,
        replacement: result.replacement,
    };
    Ok((StatusCode::GONE, Json(body)))
}

/// Mounted under `/api/subscription`.
pub fn legacy_routes() -> Router<BillingAppState> {
    Router::new().route("/update", post(update_user_plan))
}
