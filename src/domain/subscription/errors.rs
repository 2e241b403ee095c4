//! Billing error types.
//!
//! Shared by the discount evaluator, the subscription manager and the
//! application handlers.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | InvalidInput | 400 |
//! | InvalidTransition | 409 |
//! | StaleEvent | 409 |
//! | Conflict | 409 |
//! | Forbidden | 403 |
//! | Unauthorized | 401 |
//! | InvalidWebhookSignature | 401 |
//! | Provider | 502 |
//! | Infrastructure | 500 |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors returned by billing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Cannot apply {event} to a subscription in state {state}")]
    InvalidTransition { state: String, event: String },

    #[error("Event {event_id} (sequence {sequence}) is older than last applied sequence {last_sequence}")]
    StaleEvent {
        event_id: String,
        sequence: i64,
        last_sequence: i64,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid webhook signature: {0}")]
    InvalidWebhookSignature(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl BillingError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        BillingError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_transition(state: impl Into<String>, event: impl Into<String>) -> Self {
        BillingError::InvalidTransition {
            state: state.into(),
            event: event.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        BillingError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        BillingError::Forbidden(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        BillingError::Provider(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field.clone(),
        };
        BillingError::InvalidInput {
            field,
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::PageNotFound => BillingError::NotFound {
                resource: "Page",
                id: err.message,
            },
            ErrorCode::UserNotFound => BillingError::NotFound {
                resource: "User",
                id: err.message,
            },
            ErrorCode::DiscountCodeNotFound => BillingError::NotFound {
                resource: "Discount code",
                id: err.message,
            },
            ErrorCode::ValidationFailed => BillingError::InvalidInput {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::InvalidStateTransition => BillingError::InvalidTransition {
                state: "unknown".to_string(),
                event: err.message,
            },
            ErrorCode::DiscountCodeExists | ErrorCode::ConcurrentModification => {
                BillingError::Conflict(err.message)
            }
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                BillingError::Infrastructure(err.to_string())
            }
        }
    }
}
