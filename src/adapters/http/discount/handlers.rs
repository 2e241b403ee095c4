//! HTTP handlers for discount code routes.

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::{CreateDiscountCodeCommand, ValidateDiscountCodeQuery};

use super::super::auth::{AdminUser, AuthenticatedUser};
use super::super::error::ApiError;
use super::super::state::BillingAppState;
use super::dto::{
    CreateDiscountRequest, DiscountCodeListResponse, ValidateDiscountRequest,
    ValidateDiscountResponse,
};

/// POST /api/discount-codes/validate
///
/// Read-only: validating never counts a redemption.
pub async fn validate_discount_code(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Json(request): Json<ValidateDiscountRequest>,
) -> Result<Json<ValidateDiscountResponse>, ApiError> {
    let query = ValidateDiscountCodeQuery {
        code: request.code,
        plan: request.plan,
    };
    let result = state.validate_discount_handler().handle(query).await?;
    Ok(Json(result.into()))
}

/// GET /api/admin/discount-codes
pub async fn list_discount_codes(
    State(state): State<BillingAppState>,
    _admin: AdminUser,
) -> Result<Json<DiscountCodeListResponse>, ApiError> {
    let codes = state.list_discounts_handler().handle().await?;
    Ok(Json(DiscountCodeListResponse { codes }))
}

/// POST /api/admin/discount-codes
pub async fn create_discount_code(
    State(state): State<BillingAppState>,
    admin: AdminUser,
    Json(request): Json<CreateDiscountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = CreateDiscountCodeCommand {
        input: request.into(),
    };
    let code = state.create_discount_handler().handle(cmd).await?;

    tracing::info!(code = %code.code, admin = %admin.user_id, "Discount code created via admin API");
    Ok((StatusCode::CREATED, Json(code)))
}
