//! Stripe payment gateway.
//!
//! Implements the `PaymentGateway` port against the Stripe REST API.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`
//!
//! # Webhooks
//!
//! | Stripe event                         | Billing event        |
//! |--------------------------------------|----------------------|
//! | `checkout.session.completed`         | checkout-completed   |
//! | `invoice.payment_failed`             | payment-failed       |
//! | `invoice.paid` (`subscription_cycle`)| payment-recovered    |
//! | `customer.subscription.deleted`      | period-end-reached   |
//!
//! Everything else is acknowledged and ignored.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::{PageId, Timestamp};
use crate::domain::subscription::{
    BillingEvent, ProviderKind, SubscriptionEvent, SubscriptionPlan,
};
use crate::ports::{
    CancelRequest, CancelledSubscription, CheckoutRequest, CheckoutSession, CustomerRequest,
    PageLocator, PaymentError, PaymentErrorCode, PaymentGateway, TranslatedEvent,
    WebhookTranslation,
};

use super::webhook_types::{
    SignatureHeader, StripeCheckoutSession, StripeCoupon, StripeCustomer,
    StripeErrorBody, StripeInvoice, StripeSubscription, StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Checkout metadata keys. They come back on `checkout.session.completed`.
const META_PAGE_ID: &str = "page_id";
const META_PLAN: &str = "plan";
const META_DISCOUNT_CODE: &str = "discount_code";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for the Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Reject test mode events.
    require_livemode: bool,

    start_price_id: String,
    pro_price_id: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            require_livemode: false,
            start_price_id: String::new(),
            pro_price_id: String::new(),
        }
    }

    /// Recurring Stripe price ids for the paid plans.
    pub fn with_prices(mut self, start: impl Into<String>, pro: impl Into<String>) -> Self {
        self.start_price_id = start.into();
        self.pro_price_id = pro.into();
        self
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn price_id(&self, plan: SubscriptionPlan) -> Result<&str, PaymentError> {
        let id = match plan {
            SubscriptionPlan::Start => self.config.start_price_id.as_str(),
            SubscriptionPlan::Pro => self.config.pro_price_id.as_str(),
            SubscriptionPlan::Free => "",
        };
        if id.is_empty() {
            return Err(PaymentError::invalid_request(format!(
                "no Stripe price configured for plan {}",
                plan
            )));
        }
        Ok(id)
    }

    /// Form POST to the Stripe API, decoding the JSON response.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, PaymentError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        decode_response(path, response).await
    }

    /// Verify webhook signature using HMAC-SHA256.
    fn verify_signature(&self, payload: &[u8], header: &SignatureHeader) -> Result<(), PaymentError> {
        // 1. Validate timestamp
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(PaymentError::invalid_webhook(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(PaymentError::invalid_webhook("Event timestamp in future"));
        }

        // 2. Compute expected signature over "{t}.{payload}"
        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
            .map_err(|e| PaymentError::invalid_webhook(format!("Unusable signing secret: {}", e)))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        // 3. Constant-time comparison against every v1 entry
        let matched = header
            .v1_signatures
            .iter()
            .any(|provided| bool::from(expected.as_slice().ct_eq(provided.as_slice())));

        if !matched {
            tracing::warn!(
                signatures = header.v1_signatures.len(),
                "Invalid webhook signature"
            );
            return Err(PaymentError::invalid_webhook("Invalid signature"));
        }

        Ok(())
    }

    /// Parse a verified payload and map it onto a billing event.
    fn translate_event(&self, payload: &[u8]) -> Result<WebhookTranslation, PaymentError> {
        let raw: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            PaymentError::invalid_webhook(format!("Invalid JSON: {}", e))
        })?;
        let event: StripeWebhookEvent = serde_json::from_value(raw.clone())
            .map_err(|e| PaymentError::invalid_webhook(format!("Invalid event: {}", e)))?;

        if self.config.require_livemode && !event.livemode {
            tracing::warn!(event_id = %event.id, "Rejected test mode event");
            return Err(PaymentError::invalid_webhook(
                "Test mode events not allowed in production",
            ));
        }

        let ignored = |reason: &str| WebhookTranslation::Ignored {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            reason: reason.to_string(),
            payload: raw.clone(),
        };

        let mapped = match event.event_type.as_str() {
            "checkout.session.completed" => {
                let session: StripeCheckoutSession = object(&event)?;
                checkout_completed(&session)
            }
            "invoice.payment_failed" => {
                let invoice: StripeInvoice = object(&event)?;
                invoice
                    .subscription_id()
                    .map(|sub| (PageLocator::ProviderSubscription(sub.to_string()), BillingEvent::PaymentFailed))
                    .ok_or("invoice has no subscription")
            }
            "invoice.paid" => {
                let invoice: StripeInvoice = object(&event)?;
                match (invoice.billing_reason.as_deref(), invoice.subscription_id()) {
                    (Some("subscription_cycle"), Some(sub)) => Ok((
                        PageLocator::ProviderSubscription(sub.to_string()),
                        BillingEvent::PaymentRecovered,
                    )),
                    (Some("subscription_cycle"), None) => Err("invoice has no subscription"),
                    _ => Err("not a renewal invoice"),
                }
            }
            "customer.subscription.deleted" => {
                let subscription: StripeSubscription = object(&event)?;
                Ok((
                    PageLocator::ProviderSubscription(subscription.id),
                    BillingEvent::PeriodEndReached,
                ))
            }
            _ => Err("unhandled event type"),
        };

        let (locator, kind) = match mapped {
            Ok(mapped) => mapped,
            Err(reason) => return Ok(ignored(reason)),
        };

        Ok(WebhookTranslation::Event(TranslatedEvent {
            event_type: event.event_type.clone(),
            locator,
            event: SubscriptionEvent::new(event.id.clone(), event.created, ProviderKind::Stripe, kind),
            payload: raw,
            subscription_pending: false,
        }))
    }
}

fn object<T: DeserializeOwned>(event: &StripeWebhookEvent) -> Result<T, PaymentError> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        PaymentError::invalid_webhook(format!("Invalid {} object: {}", event.event_type, e))
    })
}

fn checkout_completed(
    session: &StripeCheckoutSession,
) -> Result<(PageLocator, BillingEvent), &'static str> {
    if session.mode != "subscription" {
        return Err("not a subscription checkout");
    }
    if session.payment_status == "unpaid" {
        return Err("checkout not paid");
    }

    let page_id: PageId = session
        .metadata
        .get(META_PAGE_ID)
        .and_then(|id| id.parse().ok())
        .ok_or("checkout without page metadata")?;
    let plan = session
        .metadata
        .get(META_PLAN)
        .and_then(|plan| SubscriptionPlan::parse_paid(plan).ok())
        .ok_or("checkout without paid plan metadata")?;
    let subscription_id = session
        .subscription
        .clone()
        .ok_or("checkout created no subscription")?;

    Ok((
        PageLocator::Page(page_id),
        BillingEvent::CheckoutCompleted {
            plan,
            provider_subscription_id: subscription_id,
            checkout_session_id: Some(session.id.clone()),
            discount_code: session
                .metadata
                .get(META_DISCOUNT_CODE)
                .filter(|c| !c.is_empty())
                .cloned(),
        },
    ))
}

/// Decode a successful response or classify the failure.
async fn decode_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(path, status = status.as_u16(), error = %error_text, "Stripe API call failed");

        let mut err = PaymentError::new(
            PaymentErrorCode::from_status(status.as_u16()),
            format!("Stripe API error ({})", status.as_u16()),
        );
        if let Ok(body) = serde_json::from_str::<StripeErrorBody>(&error_text) {
            if let Some(message) = body.error.message {
                err.message = format!("Stripe API error: {}", message);
            }
            if let Some(code) = body.error.code.or(body.error.error_type) {
                err = err.with_provider_code(code);
            }
        }
        return Err(err);
    }

    response.json().await.map_err(|e| {
        PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
    })
}

#[async_trait]
impl PaymentGateway for StripePaymentAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn ensure_customer(&self, request: CustomerRequest) -> Result<String, PaymentError> {
        if let Some(existing) = request.existing_customer_id {
            return Ok(existing);
        }

        let customer: StripeCustomer = self
            .post_form(
                "/v1/customers",
                &[
                    ("email", request.email),
                    ("metadata[user_id]", request.user_id.to_string()),
                ],
                Some(&format!("customer-{}", request.user_id)),
            )
            .await?;

        tracing::info!(customer_id = %customer.id, user_id = %request.user_id, "Stripe customer created");
        Ok(customer.id)
    }

    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let price_id = self.price_id(request.plan)?.to_string();
        let page_id = request.page_id.to_string();
        let plan = request.plan.to_string();

        let mut params = vec![
            ("mode", "subscription".to_string()),
            ("customer", request.customer_id.clone()),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", page_id.clone()),
            ("metadata[page_id]", page_id.clone()),
            ("metadata[plan]", plan.clone()),
            ("subscription_data[metadata][page_id]", page_id),
            ("subscription_data[metadata][plan]", plan),
        ];

        if let Some(discount) = request.discount.as_ref().filter(|d| d.effective_discount > 0) {
            // One-off coupon for the first invoice, sized to the evaluated discount.
            let coupon: StripeCoupon = self
                .post_form(
                    "/v1/coupons",
                    &[
                        ("amount_off", discount.effective_discount.to_string()),
                        ("currency", request.price.currency.to_lowercase()),
                        ("duration", "once".to_string()),
                        ("max_redemptions", "1".to_string()),
                        ("name", discount.code.clone()),
                    ],
                    None,
                )
                .await?;
            params.push(("discounts[0][coupon]", coupon.id));
            params.push(("metadata[discount_code]", discount.code.clone()));
        }

        let session: StripeCheckoutSession =
            self.post_form("/v1/checkout/sessions", &params, None).await?;

        let url = session.url.clone().ok_or_else(|| {
            PaymentError::provider("Stripe checkout session has no URL")
        })?;

        Ok(CheckoutSession { id: session.id, url })
    }

    async fn cancel_subscription(
        &self,
        request: CancelRequest,
    ) -> Result<CancelledSubscription, PaymentError> {
        let path = format!("/v1/subscriptions/{}", request.subscription_id);

        let subscription: StripeSubscription = if request.at_period_end {
            self.post_form(&path, &[("cancel_at_period_end", "true".to_string())], None)
                .await?
        } else {
            let response = self
                .http_client
                .delete(self.url(&path))
                .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
                .send()
                .await
                .map_err(|e| PaymentError::network(e.to_string()))?;
            decode_response(&path, response).await?
        };

        tracing::info!(
            subscription_id = %subscription.id,
            status = %subscription.status,
            cancel_at_period_end = subscription.cancel_at_period_end,
            "Stripe subscription cancelled"
        );
        Ok(CancelledSubscription {
            period_end: subscription.period_end().and_then(Timestamp::from_unix_secs),
        })
    }

    async fn translate_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookTranslation, PaymentError> {
        // 1. Parse signature header
        let header = SignatureHeader::parse(signature.unwrap_or_default()).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            PaymentError::invalid_webhook(e.to_string())
        })?;

        // 2. Verify signature (includes timestamp validation)
        self.verify_signature(payload, &header)?;

        // 3. Translate
        let translation = self.translate_event(payload)?;
        if let WebhookTranslation::Event(event) = &translation {
            tracing::info!(
                event_id = %event.event.event_id,
                event_type = %event.event_type,
                "Webhook signature verified"
            );
        }
        Ok(translation)
    }
}
