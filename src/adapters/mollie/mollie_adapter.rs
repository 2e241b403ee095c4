//! Mollie payment gateway.
//!
//! Mollie subscriptions are built from a first payment that sets up a
//! mandate, followed by a subscription created on the customer once that
//! payment is paid. Webhooks carry only a payment id (`id=tr_...`) and are
//! authenticated by fetching the payment back from the API.
//!
//! Translation only reads. A paid first payment comes back as a pending
//! checkout; the subscription is created in `complete_checkout`, which the
//! webhook handler calls once it knows the payment was not applied before.
//!
//! # Webhooks
//!
//! | Payment                                    | Billing event        |
//! |--------------------------------------------|----------------------|
//! | first, `paid`                              | checkout-completed   |
//! | recurring, `failed`                        | payment-failed       |
//! | recurring, `paid`                          | payment-recovered    |
//! | recurring, `canceled`/`expired`, sub ended | period-end-reached   |

use async_trait::async_trait;
use chrono::{DateTime, Months, NaiveDate, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::foundation::{PageId, Timestamp};
use crate::domain::subscription::{
    BillingEvent, PlanCatalog, ProviderKind, SubscriptionEvent, SubscriptionPlan,
};
use crate::ports::{
    CancelRequest, CancelledSubscription, CheckoutRequest, CheckoutSession, CustomerRequest,
    PageLocator, PaymentError, PaymentErrorCode, PaymentGateway, TranslatedEvent,
    WebhookTranslation,
};

use super::api_types::{
    MollieAmount, MollieCustomer, MollieErrorBody, MolliePayment, MollieSubscription,
    MollieSubscriptionList,
};

const META_PAGE_ID: &str = "page_id";
const META_PLAN: &str = "plan";
const META_DISCOUNT_CODE: &str = "discount_code";

/// Billing interval of every plan.
const SUBSCRIPTION_INTERVAL: &str = "1 month";

#[derive(Clone)]
pub struct MollieConfig {
    /// API key (live_... or test_...).
    api_key: SecretString,

    /// Base URL for the Mollie API (default: https://api.mollie.com).
    api_base_url: String,

    /// Public URL Mollie posts payment status changes to.
    webhook_url: String,

    /// Recurring prices charged by the subscription after the first payment.
    catalog: PlanCatalog,
}

impl MollieConfig {
    pub fn new(
        api_key: impl Into<String>,
        webhook_url: impl Into<String>,
        catalog: PlanCatalog,
    ) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.mollie.com".to_string(),
            webhook_url: webhook_url.into(),
            catalog,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

pub struct MolliePaymentAdapter {
    config: MollieConfig,
    http_client: reqwest::Client,
}

/// What a fetched payment means for the subscription lifecycle, before any
/// follow-up API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PaymentMeaning {
    /// First payment paid; the subscription still has to be created.
    FirstPaid {
        page_id: PageId,
        plan: SubscriptionPlan,
        customer_id: String,
        discount_code: Option<String>,
    },
    /// Recurring payment outcome on a known subscription.
    Recurring {
        subscription_id: String,
        kind: BillingEvent,
    },
    /// Recurring payment stopped; the subscription may have ended.
    MaybeEnded {
        customer_id: String,
        subscription_id: String,
    },
    Ignore(String),
}

impl MolliePaymentAdapter {
    pub fn new(config: MollieConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        decode_response(path, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<T, PaymentError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        decode_response(path, response).await
    }

    /// Live subscription of `customer_id` created for `page_id`, if any.
    async fn find_subscription_for_page(
        &self,
        customer_id: &str,
        page_id: PageId,
    ) -> Result<Option<MollieSubscription>, PaymentError> {
        let list: MollieSubscriptionList = self
            .get(&format!("/v2/customers/{}/subscriptions?limit=250", customer_id))
            .await?;

        let page = page_id.to_string();
        Ok(list
            .embedded
            .subscriptions
            .into_iter()
            .find(|sub| sub.is_live() && sub.metadata(META_PAGE_ID) == Some(page.as_str())))
    }

    /// Creates the recurring subscription after a paid first payment.
    ///
    /// Keyed on the payment id, so a retry inside Mollie's idempotency
    /// window gets the same subscription back.
    async fn create_subscription(
        &self,
        payment: &MolliePayment,
        page_id: PageId,
        plan: SubscriptionPlan,
        customer_id: &str,
    ) -> Result<MollieSubscription, PaymentError> {
        let price = self.config.catalog.price_for(plan).ok_or_else(|| {
            PaymentError::invalid_request(format!("no price for plan {}", plan))
        })?;

        let paid_at = DateTime::parse_from_rfc3339(payment.status_changed_at())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let start_date = paid_at
            .checked_add_months(Months::new(1))
            .unwrap_or(paid_at)
            .format("%Y-%m-%d")
            .to_string();

        let body = serde_json::json!({
            "amount": MollieAmount::from_minor(price.amount, &price.currency),
            "interval": SUBSCRIPTION_INTERVAL,
            "startDate": start_date,
            "description": format!("Page {} {} plan", page_id, plan),
            "webhookUrl": self.config.webhook_url,
            "metadata": { META_PAGE_ID: page_id.to_string(), META_PLAN: plan.as_str() },
        });

        let subscription: MollieSubscription = self
            .post(
                &format!("/v2/customers/{}/subscriptions", customer_id),
                &body,
                Some(&payment.id),
            )
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            payment_id = %payment.id,
            page_id = %page_id,
            start_date = %start_date,
            "Mollie subscription created"
        );
        Ok(subscription)
    }

    async fn translate_payment(&self, payment_id: &str) -> Result<WebhookTranslation, PaymentError> {
        let payment: MolliePayment = self.get(&format!("/v2/payments/{}", payment_id)).await?;

        // Mollie calls once per status change of the same payment.
        let event_id = format!("{}:{}", payment.id, payment.status);
        let event_type = format!("payment.{}.{}", payment.sequence_type, payment.status);
        let sequence = DateTime::parse_from_rfc3339(payment.status_changed_at())
            .map(|dt| dt.timestamp())
            .map_err(|e| PaymentError::provider(format!("Invalid Mollie timestamp: {}", e)))?;
        let payload = serde_json::to_value(&payment).unwrap_or_default();

        let mut subscription_pending = false;
        let (locator, kind) = match classify(&payment) {
            PaymentMeaning::FirstPaid {
                page_id,
                plan,
                discount_code,
                ..
            } => {
                subscription_pending = true;
                (
                    PageLocator::Page(page_id),
                    BillingEvent::CheckoutCompleted {
                        plan,
                        provider_subscription_id: String::new(),
                        checkout_session_id: Some(payment.id.clone()),
                        discount_code,
                    },
                )
            }
            PaymentMeaning::Recurring {
                subscription_id,
                kind,
            } => (PageLocator::ProviderSubscription(subscription_id), kind),
            PaymentMeaning::MaybeEnded {
                customer_id,
                subscription_id,
            } => {
                let subscription: MollieSubscription = self
                    .get(&format!(
                        "/v2/customers/{}/subscriptions/{}",
                        customer_id, subscription_id
                    ))
                    .await?;
                if !matches!(subscription.status.as_str(), "canceled" | "completed") {
                    return Ok(WebhookTranslation::Ignored {
                        event_id,
                        event_type,
                        reason: format!("subscription still {}", subscription.status),
                        payload,
                    });
                }
                (
                    PageLocator::ProviderSubscription(subscription_id),
                    BillingEvent::PeriodEndReached,
                )
            }
            PaymentMeaning::Ignore(reason) => {
                return Ok(WebhookTranslation::Ignored {
                    event_id,
                    event_type,
                    reason,
                    payload,
                })
            }
        };

        Ok(WebhookTranslation::Event(TranslatedEvent {
            event_type,
            locator,
            event: SubscriptionEvent::new(event_id, sequence, ProviderKind::Mollie, kind),
            payload,
            subscription_pending,
        }))
    }
}

/// Start of the day Mollie collects the next payment, which is when the
/// paid period ends.
fn parse_payment_date(date: &str) -> Option<Timestamp> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let midnight = day.and_hms_opt(0, 0, 0)?;
    Some(Timestamp::from_datetime(Utc.from_utc_datetime(&midnight)))
}

fn classify(payment: &MolliePayment) -> PaymentMeaning {
    let ignore = |reason: &str| PaymentMeaning::Ignore(reason.to_string());

    match (payment.sequence_type.as_str(), payment.status.as_str()) {
        (_, "open" | "pending" | "authorized") => ignore("payment not settled"),
        ("first", "paid") => {
            let page_id = payment
                .metadata(META_PAGE_ID)
                .and_then(|id| id.parse::<PageId>().ok());
            let plan = payment
                .metadata(META_PLAN)
                .and_then(|plan| SubscriptionPlan::parse_paid(plan).ok());
            match (page_id, plan, payment.customer_id.clone()) {
                (Some(page_id), Some(plan), Some(customer_id)) => PaymentMeaning::FirstPaid {
                    page_id,
                    plan,
                    customer_id,
                    discount_code: payment.metadata(META_DISCOUNT_CODE).map(str::to_string),
                },
                _ => ignore("first payment without page metadata"),
            }
        }
        ("first", "failed" | "canceled" | "expired") => ignore("checkout not completed"),
        ("recurring", status) => {
            let subscription_id = match payment.subscription_id.clone() {
                Some(id) => id,
                None => return ignore("recurring payment without subscription"),
            };
            match status {
                "paid" => PaymentMeaning::Recurring {
                    subscription_id,
                    kind: BillingEvent::PaymentRecovered,
                },
                "failed" => PaymentMeaning::Recurring {
                    subscription_id,
                    kind: BillingEvent::PaymentFailed,
                },
                "canceled" | "expired" => match payment.customer_id.clone() {
                    Some(customer_id) => PaymentMeaning::MaybeEnded {
                        customer_id,
                        subscription_id,
                    },
                    None => ignore("recurring payment without customer"),
                },
                other => {
                    tracing::warn!(payment_id = %payment.id, status = other, "Unknown Mollie payment status");
                    PaymentMeaning::Ignore(format!("unknown payment status {}", other))
                }
            }
        }
        ("oneoff", _) => ignore("one-off payment"),
        (sequence_type, status) => {
            tracing::warn!(
                payment_id = %payment.id,
                sequence_type,
                status,
                "Unknown Mollie payment state"
            );
            PaymentMeaning::Ignore(format!("unknown payment state {}/{}", sequence_type, status))
        }
    }
}

/// Payment id from a webhook body (`id=tr_...`).
fn payment_id_from_body(payload: &[u8]) -> Result<String, PaymentError> {
    let body = std::str::from_utf8(payload)
        .map_err(|_| PaymentError::invalid_webhook("Webhook body is not UTF-8"))?;

    let id = body
        .trim()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "id")
        .map(|(_, value)| value)
        .ok_or_else(|| PaymentError::invalid_webhook("Webhook body has no payment id"))?;

    let well_formed = id.starts_with("tr_")
        && id.len() > 3
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !well_formed {
        return Err(PaymentError::invalid_webhook("Malformed payment id"));
    }
    Ok(id.to_string())
}

async fn decode_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(path, status = status.as_u16(), error = %error_text, "Mollie API call failed");

        let mut err = PaymentError::new(
            PaymentErrorCode::from_status(status.as_u16()),
            format!("Mollie API error ({})", status.as_u16()),
        );
        if let Ok(body) = serde_json::from_str::<MollieErrorBody>(&error_text) {
            if let Some(detail) = body.detail {
                err.message = format!("Mollie API error: {}", detail);
            }
            if let Some(title) = body.field.or(body.title) {
                err = err.with_provider_code(title);
            }
        }
        return Err(err);
    }

    response
        .json()
        .await
        .map_err(|e| PaymentError::provider(format!("Failed to parse Mollie response: {}", e)))
}

#[async_trait]
impl PaymentGateway for MolliePaymentAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mollie
    }

    async fn ensure_customer(&self, request: CustomerRequest) -> Result<String, PaymentError> {
        if let Some(existing) = request.existing_customer_id {
            return Ok(existing);
        }

        let body = serde_json::json!({
            "email": request.email,
            "metadata": { "user_id": request.user_id.to_string() },
        });
        let customer: MollieCustomer = self.post("/v2/customers", &body, None).await?;

        tracing::info!(customer_id = %customer.id, user_id = %request.user_id, "Mollie customer created");
        Ok(customer.id)
    }

    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let amount_due = request.amount_due();
        if amount_due <= 0 {
            return Err(PaymentError::invalid_request(
                "Mollie requires a non-zero first payment",
            ));
        }

        let mut metadata = serde_json::json!({
            META_PAGE_ID: request.page_id.to_string(),
            META_PLAN: request.plan.as_str(),
        });
        if let Some(discount) = &request.discount {
            metadata[META_DISCOUNT_CODE] = serde_json::Value::String(discount.code.clone());
        }

        let body = serde_json::json!({
            "amount": MollieAmount::from_minor(amount_due, &request.price.currency),
            "customerId": request.customer_id,
            "sequenceType": "first",
            "description": format!("Page {} {} plan", request.page_id, request.plan),
            "redirectUrl": request.success_url,
            "cancelUrl": request.cancel_url,
            "webhookUrl": self.config.webhook_url,
            "metadata": metadata,
        });

        let payment: MolliePayment = self.post("/v2/payments", &body, None).await?;
        let url = payment
            .links
            .checkout
            .map(|link| link.href)
            .ok_or_else(|| PaymentError::provider("Mollie payment has no checkout link"))?;

        Ok(CheckoutSession { id: payment.id, url })
    }

    /// Mollie cancels immediately: no further payments are collected and
    /// the paid period runs out on its own. `at_period_end` only affects
    /// the page state, not the API call.
    ///
    /// Mollie sends nothing when that period ends, so the next payment date
    /// is reported back as the period end for the expiry sweep.
    async fn cancel_subscription(
        &self,
        request: CancelRequest,
    ) -> Result<CancelledSubscription, PaymentError> {
        let customer_id = request.customer_id.ok_or_else(|| {
            PaymentError::invalid_request("Mollie cancellation requires the customer id")
        })?;
        let path = format!(
            "/v2/customers/{}/subscriptions/{}",
            customer_id, request.subscription_id
        );

        // Cancelled subscriptions no longer carry a next payment date.
        let current: MollieSubscription = self.get(&path).await?;
        let period_end = current
            .next_payment_date
            .as_deref()
            .and_then(parse_payment_date);

        let response = self
            .http_client
            .delete(self.url(&path))
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        let subscription: MollieSubscription = decode_response(&path, response).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            status = %subscription.status,
            at_period_end = request.at_period_end,
            period_end = ?period_end,
            "Mollie subscription cancelled"
        );
        Ok(CancelledSubscription { period_end })
    }

    async fn translate_webhook(
        &self,
        payload: &[u8],
        _signature: Option<&str>,
    ) -> Result<WebhookTranslation, PaymentError> {
        let payment_id = payment_id_from_body(payload).map_err(|e| {
            tracing::warn!(error = %e, "Rejected Mollie webhook body");
            e
        })?;

        // An unknown id means the call did not come from Mollie.
        self.translate_payment(&payment_id).await.map_err(|e| {
            if e.code == PaymentErrorCode::NotFound {
                tracing::warn!(payment_id = %payment_id, "Webhook for unknown Mollie payment");
                PaymentError::invalid_webhook(format!("Unknown payment {}", payment_id))
            } else {
                e
            }
        })
    }

    async fn complete_checkout(
        &self,
        mut translated: TranslatedEvent,
    ) -> Result<TranslatedEvent, PaymentError> {
        if !translated.subscription_pending {
            return Ok(translated);
        }

        let payment: MolliePayment = serde_json::from_value(translated.payload.clone())
            .map_err(|e| PaymentError::provider(format!("Invalid Mollie payment payload: {}", e)))?;
        let (page_id, plan, customer_id) = match classify(&payment) {
            PaymentMeaning::FirstPaid {
                page_id,
                plan,
                customer_id,
                ..
            } => (page_id, plan, customer_id),
            _ => {
                return Err(PaymentError::invalid_request(format!(
                    "payment {} is not a paid first payment",
                    payment.id
                )))
            }
        };

        let subscription_id = match self.find_subscription_for_page(&customer_id, page_id).await? {
            Some(existing) => {
                tracing::info!(
                    subscription_id = %existing.id,
                    payment_id = %payment.id,
                    page_id = %page_id,
                    "Mollie subscription already exists for page"
                );
                existing.id
            }
            None => {
                self.create_subscription(&payment, page_id, plan, &customer_id)
                    .await?
                    .id
            }
        };

        if let BillingEvent::CheckoutCompleted {
            provider_subscription_id,
            ..
        } = &mut translated.event.kind
        {
            *provider_subscription_id = subscription_id;
        }
        translated.subscription_pending = false;
        Ok(translated)
    }
}
