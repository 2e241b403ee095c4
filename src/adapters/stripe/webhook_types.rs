//! Stripe-specific types for webhook handling and API responses.
//!
//! These types mirror the subset of Stripe objects billing reads. Unknown
//! fields are ignored so new API versions do not break parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureParseError {
    #[error("Missing Stripe-Signature header")]
    MissingHeader,

    #[error("Missing timestamp (t=) in signature")]
    MissingTimestamp,

    #[error("Missing v1 signature in header")]
    MissingV1Signature,

    #[error("Invalid timestamp format")]
    InvalidTimestamp,

    #[error("Invalid signature format (not valid hex)")]
    InvalidSignatureFormat,
}

/// Parsed Stripe-Signature header.
///
/// The header format is `t=timestamp,v1=signature[,v1=signature...]`.
/// Stripe sends several `v1` entries while a signing secret is being
/// rolled; any one of them may match.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe signed the delivery.
    pub timestamp: i64,

    /// HMAC-SHA256 signatures, hex-decoded.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        let header = header.trim();
        if header.is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = match part.split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => v1_signatures.push(
                    hex_decode(value).ok_or(SignatureParseError::InvalidSignatureFormat)?,
                ),
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created. Used as the ordering key.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Objects
// ════════════════════════════════════════════════════════════════════════════════

/// Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Session identifier (cs_...).
    pub id: String,

    pub customer: Option<String>,

    /// Subscription created by a `mode=subscription` session.
    pub subscription: Option<String>,

    /// paid, unpaid or no_payment_required.
    #[serde(default)]
    pub payment_status: String,

    /// payment, setup or subscription.
    #[serde(default)]
    pub mode: String,

    /// Hosted checkout URL; only present on creation responses.
    pub url: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    /// Customer identifier (cus_...).
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Subscription identifier (sub_...).
    pub id: String,
    pub customer: String,
    pub status: String,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// End of the paid period on API versions before 2025-03.
    #[serde(default)]
    pub current_period_end: Option<i64>,

    /// Newer API versions carry the period per item.
    #[serde(default)]
    pub items: Option<StripeList<StripeSubscriptionItem>>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeSubscription {
    /// End of the paid period, in Unix seconds.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .as_ref()
                .and_then(|items| items.data.iter().filter_map(|i| i.current_period_end).max())
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionItem {
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Invoice identifier (in_...).
    pub id: String,
    pub customer: Option<String>,

    /// Subscription reference on API versions before 2025-03.
    pub subscription: Option<String>,

    /// Subscription reference on newer API versions.
    pub parent: Option<StripeInvoiceParent>,

    /// subscription_create, subscription_cycle, subscription_update, manual...
    pub billing_reason: Option<String>,

    #[serde(default)]
    pub attempt_count: i32,

    #[serde(default)]
    pub amount_paid: i64,

    #[serde(default)]
    pub currency: String,
}

impl StripeInvoice {
    /// Subscription the invoice belongs to, whichever field carries it.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.subscription_details.as_ref())
                .and_then(|d| d.subscription.as_deref())
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionDetails {
    pub subscription: Option<String>,
}

/// Coupon created for a one-off checkout discount.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCoupon {
    pub id: String,
}

/// Error body returned by the Stripe API.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}
