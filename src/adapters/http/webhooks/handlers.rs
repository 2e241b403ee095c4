//! HTTP handlers for provider webhooks.

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::HeaderMap;
use serde::Serialize;

use crate::application::handlers::{HandleProviderWebhookCommand, HandleProviderWebhookResult};
use crate::domain::subscription::{ProviderKind, SubscriptionPhase, SubscriptionPlan};

use super::super::error::ApiError;
use super::super::state::BillingAppState;

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Acknowledgement body returned to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<SubscriptionPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<SubscriptionPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<HandleProviderWebhookResult> for WebhookResponse {
    fn from(result: HandleProviderWebhookResult) -> Self {
        let empty = WebhookResponse {
            status: "",
            page_id: None,
            plan: None,
            phase: None,
            reason: None,
        };
        match result {
            HandleProviderWebhookResult::Applied { page_id, state } => WebhookResponse {
                status: "applied",
                page_id: Some(page_id.to_string()),
                plan: Some(state.plan()),
                phase: Some(state.phase()),
                ..empty
            },
            HandleProviderWebhookResult::Acknowledged { page_id } => WebhookResponse {
                status: "acknowledged",
                page_id: Some(page_id.to_string()),
                ..empty
            },
            HandleProviderWebhookResult::Ignored { reason } => WebhookResponse {
                status: "ignored",
                reason: Some(reason),
                ..empty
            },
            HandleProviderWebhookResult::AlreadyProcessed => WebhookResponse {
                status: "already_processed",
                ..empty
            },
        }
    }
}

async fn process(
    state: &BillingAppState,
    provider: ProviderKind,
    body: Bytes,
    signature: Option<String>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let cmd = HandleProviderWebhookCommand {
        provider,
        payload: body.to_vec(),
        signature,
    };

    let result = state.webhook_handler().handle(cmd).await.map_err(|err| {
        tracing::warn!(provider = %provider, error = %err, "Webhook delivery rejected");
        err
    })?;

    Ok(Json(result.into()))
}

/// POST /api/webhooks/stripe
///
/// A missing `Stripe-Signature` header is passed through as `None`; the
/// gateway refuses unsigned deliveries.
pub async fn handle_stripe_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    process(&state, ProviderKind::Stripe, body, signature).await
}

/// POST /api/webhooks/mollie
///
/// Mollie posts `id=tr_...` unsigned; the gateway fetches the payment back
/// from the API before trusting it.
pub async fn handle_mollie_webhook(
    State(state): State<BillingAppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    process(&state, ProviderKind::Mollie, body, None).await
}
