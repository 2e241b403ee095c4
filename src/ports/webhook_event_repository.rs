//! WebhookEventRepository port - Processed provider webhook log.
//!
//! Providers redeliver on timeouts and non-2xx responses, and may deliver
//! an old event after a newer one. The log is keyed by (provider, event id)
//! so any redelivery is skipped, not just a repeat of the last event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::{DomainError, PageId};
use crate::domain::subscription::ProviderKind;

/// How a webhook was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingResult {
    /// A transition was applied.
    Success,
    /// Acknowledged without a transition.
    Ignored,
    /// Rejected; the provider will see an error and may retry.
    Failed,
}

impl ProcessingResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingResult::Success => "success",
            ProcessingResult::Ignored => "ignored",
            ProcessingResult::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ProcessingResult::Success),
            "ignored" => Some(ProcessingResult::Ignored),
            "failed" => Some(ProcessingResult::Failed),
            _ => None,
        }
    }
}

/// Record of a processed webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    pub provider: ProviderKind,

    /// Provider event id (`evt_...` for Stripe, `tr_...` for Mollie).
    pub event_id: String,

    /// Provider event type, or the payment status for Mollie.
    pub event_type: String,

    pub page_id: Option<PageId>,
    pub processed_at: DateTime<Utc>,
    pub result: ProcessingResult,

    /// Reason for an ignored event or error for a failed one.
    pub detail: Option<String>,

    /// Original payload for debugging.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    fn with_result(
        provider: ProviderKind,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        result: ProcessingResult,
        detail: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            provider,
            event_id: event_id.into(),
            event_type: event_type.into(),
            page_id: None,
            processed_at: Utc::now(),
            result,
            detail,
            payload,
        }
    }

    pub fn success(
        provider: ProviderKind,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_result(
            provider,
            event_id,
            event_type,
            ProcessingResult::Success,
            None,
            payload,
        )
    }

    pub fn ignored(
        provider: ProviderKind,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_result(
            provider,
            event_id,
            event_type,
            ProcessingResult::Ignored,
            Some(reason.into()),
            payload,
        )
    }

    pub fn failed(
        provider: ProviderKind,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        error: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::with_result(
            provider,
            event_id,
            event_type,
            ProcessingResult::Failed,
            Some(error.into()),
            payload,
        )
    }

    pub fn for_page(mut self, page_id: PageId) -> Self {
        self.page_id = Some(page_id);
        self
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time seeing this event.
    Inserted,
    /// Another delivery already recorded it.
    AlreadyExists,
}

/// Port for storing and retrieving processed webhook events.
///
/// Implementations use a unique key on (provider, event_id) with
/// `ON CONFLICT DO NOTHING` semantics.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find(
        &self,
        provider: ProviderKind,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;
}
