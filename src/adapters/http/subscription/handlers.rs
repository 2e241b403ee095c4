//! HTTP handlers for page subscription routes.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::{
    CancelSubscriptionCommand, ExpireCancelledSubscriptionsCommand,
    ExpireCancelledSubscriptionsResult, GetSubscriptionQuery, StartCheckoutCommand,
    SubscriptionView,
};
use crate::domain::foundation::{PageId, Timestamp};
use crate::domain::subscription::{BillingError, SubscriptionPlan};

use super::super::auth::{AdminUser, AuthenticatedUser};
use super::super::error::ApiError;
use super::super::state::BillingAppState;
use super::dto::{CancelSubscriptionRequest, CheckoutResponse, StartCheckoutRequest};

fn parse_page_id(raw: &str) -> Result<PageId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(BillingError::invalid_input("page_id", "must be a UUID")))
}

/// POST /api/pages/:page_id/subscription/checkout
pub async fn start_checkout(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Path(page_id): Path<String>,
    Json(request): Json<StartCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let page_id = parse_page_id(&page_id)?;
    let plan: SubscriptionPlan = request.plan.parse()?;

    let cmd = StartCheckoutCommand {
        user_id: user.user_id,
        page_id,
        plan,
        discount_code: request.discount_code,
        success_url: request.success_url,
        cancel_url: request.cancel_url,
    };
    let result = state.start_checkout_handler().handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::new(plan, result))))
}

/// POST /api/pages/:page_id/subscription/cancel
pub async fn cancel_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Path(page_id): Path<String>,
    request: Option<Json<CancelSubscriptionRequest>>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let page_id = parse_page_id(&page_id)?;
    let Json(request) = request.unwrap_or_default();

    let cmd = CancelSubscriptionCommand {
        user_id: user.user_id,
        page_id,
        immediate: request.immediate,
    };
    let result = state.cancel_subscription_handler().handle(cmd).await?;

    Ok(Json(SubscriptionView::from_page(&result.page)?))
}

/// POST /api/admin/subscriptions/expire-cancelled
pub async fn expire_cancelled_subscriptions(
    State(state): State<BillingAppState>,
    admin: AdminUser,
) -> Result<Json<ExpireCancelledSubscriptionsResult>, ApiError> {
    let cmd = ExpireCancelledSubscriptionsCommand {
        as_of: Timestamp::now(),
    };
    let result = state.expire_cancelled_handler().handle(cmd).await?;

    tracing::info!(
        admin = %admin.user_id,
        expired = result.expired.len(),
        "Expiry sweep run via admin API"
    );
    Ok(Json(result))
}

/// GET /api/pages/:page_id/subscription
pub async fn get_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Path(page_id): Path<String>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let query = GetSubscriptionQuery {
        user_id: user.user_id,
        page_id: parse_page_id(&page_id)?,
    };
    let view = state.get_subscription_handler().handle(query).await?;
    Ok(Json(view))
}
