//! Error responses.
//!
//! Every failed request gets a JSON body `{code, message}`, plus `details`
//! when there is something structured to add.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ValidationError};
use crate::domain::subscription::BillingError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Stable error code for programmatic handling.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Billing error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BillingError);

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            BillingError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            BillingError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            BillingError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            BillingError::StaleEvent { .. } => (StatusCode::CONFLICT, "STALE_EVENT"),
            BillingError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            BillingError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            BillingError::Unauthorized => (StatusCode::UNAUTHORIZED, "AUTHENTICATION_REQUIRED"),
            BillingError::InvalidWebhookSignature(_) => {
                (StatusCode::UNAUTHORIZED, "INVALID_WEBHOOK_SIGNATURE")
            }
            BillingError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
            BillingError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = match &self.0 {
            BillingError::Infrastructure(detail) => {
                tracing::error!(error = %detail, "Request failed");
                ErrorResponse::new(code, "Internal server error")
            }
            BillingError::Provider(detail) => {
                tracing::warn!(error = %detail, "Payment provider call failed");
                ErrorResponse::new(code, self.0.to_string())
            }
            BillingError::InvalidInput { field, .. } => ErrorResponse::new(code, self.0.to_string())
                .with_details(serde_json::json!({ "field": field })),
            _ => ErrorResponse::new(code, self.0.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
