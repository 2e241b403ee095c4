//! Payment gateway port.
//!
//! One implementation per provider (Stripe, Mollie). The gateway hides the
//! provider's API and webhook formats; everything it reports back is an
//! abstract `SubscriptionEvent`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::discount::AppliedDiscount;
use crate::domain::foundation::{PageId, Timestamp, UserId};
use crate::domain::subscription::{
    BillingError, PlanPrice, ProviderKind, SubscriptionEvent, SubscriptionPlan,
};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider this gateway talks to.
    fn kind(&self) -> ProviderKind;

    /// Return the provider customer id for a user, creating the customer
    /// when `existing_customer_id` is `None`.
    async fn ensure_customer(&self, request: CustomerRequest) -> Result<String, PaymentError>;

    /// Start a hosted checkout for a page's plan.
    ///
    /// The page id, plan and discount code travel in the checkout metadata
    /// and come back on the completion webhook.
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Cancel a provider subscription now or at the end of the period.
    async fn cancel_subscription(
        &self,
        request: CancelRequest,
    ) -> Result<CancelledSubscription, PaymentError>;

    /// Authenticate a webhook delivery and translate it.
    ///
    /// # Errors
    ///
    /// - `InvalidWebhook` for bad signatures or unparseable payloads
    /// - provider errors if the gateway must call back into the API
    async fn translate_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookTranslation, PaymentError>;

    /// Finish provider-side setup for a checkout event translated with
    /// `subscription_pending`, filling in the provider subscription id.
    ///
    /// Called only once the event is known to be new for the page, so
    /// redeliveries never repeat the provider calls.
    async fn complete_checkout(
        &self,
        translated: TranslatedEvent,
    ) -> Result<TranslatedEvent, PaymentError> {
        Ok(translated)
    }
}

#[derive(Debug, Clone)]
pub struct CustomerRequest {
    pub user_id: UserId,
    pub email: String,
    pub existing_customer_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub page_id: PageId,
    pub user_id: UserId,
    pub customer_id: String,
    pub plan: SubscriptionPlan,
    pub price: PlanPrice,
    pub discount: Option<AppliedDiscount>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// First charge after any discount.
    pub fn amount_due(&self) -> i64 {
        self.discount
            .as_ref()
            .map_or(self.price.amount, |d| d.final_price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session or payment id.
    pub id: String,

    /// Hosted page the customer is redirected to.
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CancelRequest {
    /// Needed by providers that scope subscriptions under customers.
    pub customer_id: Option<String>,
    pub subscription_id: String,
    pub at_period_end: bool,
}

/// What the provider reported after a cancellation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelledSubscription {
    /// When the paid period runs out, if the provider knows.
    pub period_end: Option<Timestamp>,
}

/// How to find the page a webhook is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLocator {
    /// From checkout metadata.
    Page(PageId),
    /// From the provider subscription reference.
    ProviderSubscription(String),
}

/// A webhook that maps onto the subscription lifecycle.
#[derive(Debug, Clone)]
pub struct TranslatedEvent {
    pub event_type: String,
    pub locator: PageLocator,
    pub event: SubscriptionEvent,
    pub payload: serde_json::Value,

    /// The provider subscription does not exist yet. The event's
    /// `provider_subscription_id` is empty until `complete_checkout` runs.
    pub subscription_pending: bool,
}

/// Outcome of translating a webhook delivery.
#[derive(Debug, Clone)]
pub enum WebhookTranslation {
    Event(TranslatedEvent),

    /// Authentic but irrelevant to the lifecycle. Acknowledged and logged.
    Ignored {
        event_id: String,
        event_type: String,
        reason: String,
        payload: serde_json::Value,
    },
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,

    /// Provider's own error code, if it sent one.
    pub provider_code: Option<String>,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidRequest, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl From<PaymentError> for BillingError {
    fn from(err: PaymentError) -> Self {
        match err.code {
            PaymentErrorCode::InvalidWebhook => BillingError::InvalidWebhookSignature(err.message),
            _ => BillingError::Provider(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    NetworkError,
    AuthenticationError,
    InvalidRequest,
    NotFound,
    RateLimitExceeded,
    InvalidWebhook,
    ProviderError,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError | PaymentErrorCode::RateLimitExceeded
        )
    }

    /// Classify an HTTP status returned by a provider API.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => PaymentErrorCode::AuthenticationError,
            404 => PaymentErrorCode::NotFound,
            429 => PaymentErrorCode::RateLimitExceeded,
            400..=499 => PaymentErrorCode::InvalidRequest,
            _ => PaymentErrorCode::ProviderError,
        }
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}
