//! Mollie API objects.
//!
//! Only the fields billing reads. Mollie uses camelCase JSON and decimal
//! string amounts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Money as Mollie sends it: `{"currency": "EUR", "value": "12.00"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MollieAmount {
    pub currency: String,
    pub value: String,
}

impl MollieAmount {
    /// Amount from minor units. Assumes a two-decimal currency.
    pub fn from_minor(amount: i64, currency: &str) -> Self {
        let sign = if amount < 0 { "-" } else { "" };
        let abs = amount.unsigned_abs();
        Self {
            currency: currency.to_uppercase(),
            value: format!("{}{}.{:02}", sign, abs / 100, abs % 100),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MolliePayment {
    /// Payment identifier (tr_...).
    pub id: String,

    /// open, pending, authorized, paid, canceled, expired, failed.
    pub status: String,

    /// oneoff, first or recurring.
    #[serde(default)]
    pub sequence_type: String,

    pub amount: MollieAmount,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub mandate_id: Option<String>,

    pub created_at: String,
    pub paid_at: Option<String>,
    pub failed_at: Option<String>,
    pub canceled_at: Option<String>,
    pub expired_at: Option<String>,

    /// Mollie echoes back whatever JSON was attached at creation.
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,

    #[serde(rename = "_links", default)]
    pub links: MollieLinks,
}

impl MolliePayment {
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Timestamp of the status change this webhook reports.
    pub fn status_changed_at(&self) -> &str {
        let changed = match self.status.as_str() {
            "paid" => self.paid_at.as_deref(),
            "failed" => self.failed_at.as_deref(),
            "canceled" => self.canceled_at.as_deref(),
            "expired" => self.expired_at.as_deref(),
            _ => None,
        };
        changed.unwrap_or(&self.created_at)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MollieLinks {
    /// Hosted checkout page; present while the payment is open.
    pub checkout: Option<MollieLink>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MollieLink {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MollieCustomer {
    /// Customer identifier (cst_...).
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MollieSubscription {
    /// Subscription identifier (sub_...).
    pub id: String,

    /// pending, active, canceled, suspended, completed.
    pub status: String,

    pub customer_id: Option<String>,

    /// Date of the next charge (`YYYY-MM-DD`). Absent once cancelled.
    pub next_payment_date: Option<String>,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl MollieSubscription {
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(serde_json::Value::as_str)
    }

    /// Still collecting payments.
    pub fn is_live(&self) -> bool {
        matches!(self.status.as_str(), "pending" | "active")
    }
}

/// Page of a customer's subscriptions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MollieSubscriptionList {
    #[serde(rename = "_embedded", default)]
    pub embedded: MollieSubscriptionsEmbedded,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MollieSubscriptionsEmbedded {
    #[serde(default)]
    pub subscriptions: Vec<MollieSubscription>,
}

/// Error body (RFC 7807 problem details). The HTTP status is taken from
/// the response itself.
#[derive(Debug, Clone, Deserialize)]
pub struct MollieErrorBody {
    pub title: Option<String>,
    pub detail: Option<String>,
    pub field: Option<String>,
}
