//! Caller identity extractors.
//!
//! Sign-in happens upstream. The auth proxy forwards the verified user id
//! in `X-User-Id`; billing trusts it and looks up the admin flag itself.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::foundation::UserId;
use crate::domain::subscription::BillingError;

use super::error::ApiError;
use super::state::BillingAppState;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// A signed-in user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s.trim()).ok())
            .ok_or(ApiError(BillingError::Unauthorized))?;

        Ok(AuthenticatedUser { user_id })
    }
}

/// A signed-in user with the admin flag set.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<BillingAppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BillingAppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser { user_id } =
            AuthenticatedUser::from_request_parts(parts, state).await?;

        let is_admin = state
            .users
            .find_by_id(&user_id)
            .await?
            .map_or(false, |user| user.is_admin);

        if !is_admin {
            tracing::warn!(user_id = %user_id, "Admin route refused");
            return Err(ApiError(BillingError::forbidden("admin access required")));
        }

        Ok(AdminUser { user_id })
    }
}
