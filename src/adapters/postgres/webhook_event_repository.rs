//! PostgreSQL implementation of WebhookEventRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, PageId};
use crate::domain::subscription::ProviderKind;
use crate::ports::{ProcessingResult, SaveResult, WebhookEventRecord, WebhookEventRepository};

use super::parse_column;

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    provider: String,
    event_id: String,
    event_type: String,
    page_id: Option<Uuid>,
    processed_at: DateTime<Utc>,
    result: String,
    detail: Option<String>,
    payload: serde_json::Value,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let result = ProcessingResult::parse(&row.result).ok_or_else(|| {
            DomainError::database(format!("Invalid webhook result value: {}", row.result))
        })?;

        Ok(WebhookEventRecord {
            provider: parse_column("provider", &row.provider)?,
            event_id: row.event_id,
            event_type: row.event_type,
            page_id: row.page_id.map(PageId::from_uuid),
            processed_at: row.processed_at,
            result,
            detail: row.detail,
            payload: row.payload,
        })
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find(
        &self,
        provider: ProviderKind,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT provider, event_id, event_type, page_id, processed_at, result, detail, payload
            FROM webhook_events
            WHERE provider = $1 AND event_id = $2
            "#,
        )
        .bind(provider.as_str())
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load webhook event: {}", e)))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                provider, event_id, event_type, page_id, processed_at, result, detail, payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (provider, event_id) DO NOTHING
            "#,
        )
        .bind(record.provider.as_str())
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(record.page_id.map(|id| *id.as_uuid()))
        .bind(record.processed_at)
        .bind(record.result.as_str())
        .bind(&record.detail)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save webhook event: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }
}
