//! PostgreSQL implementation of PageRepository.
//!
//! Reads and writes only the subscription columns of `pages`. Every write
//! is a single conditional UPDATE on `subscription_version`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, PageId, Timestamp, UserId};
use crate::domain::subscription::{PageSubscription, ProviderKind};
use crate::ports::PageRepository;

use super::parse_column;

const PAGE_COLUMNS: &str = r#"
    id, user_id, plan, subscription_status, cancel_at_period_end,
    payment_provider, provider_subscription_id, current_period_end,
    last_event_id, last_event_sequence, subscription_version,
    subscription_updated_at
"#;

pub struct PostgresPageRepository {
    pool: PgPool,
}

impl PostgresPageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PageRow {
    id: Uuid,
    user_id: String,
    plan: String,
    subscription_status: String,
    cancel_at_period_end: bool,
    payment_provider: Option<String>,
    provider_subscription_id: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    last_event_id: Option<String>,
    last_event_sequence: Option<i64>,
    subscription_version: i64,
    subscription_updated_at: DateTime<Utc>,
}

impl TryFrom<PageRow> for PageSubscription {
    type Error = DomainError;

    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        Ok(PageSubscription {
            page_id: PageId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::database(format!("Invalid user_id on page {}: {}", row.id, e))
            })?,
            plan: parse_column("plan", &row.plan)?,
            status: parse_column("subscription_status", &row.subscription_status)?,
            cancel_at_period_end: row.cancel_at_period_end,
            provider: row
                .payment_provider
                .as_deref()
                .map(|p| parse_column::<ProviderKind>("payment_provider", p))
                .transpose()?,
            provider_subscription_id: row.provider_subscription_id,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            last_event_id: row.last_event_id,
            last_event_sequence: row.last_event_sequence,
            version: row.subscription_version,
            updated_at: Timestamp::from_datetime(row.subscription_updated_at),
        })
    }
}

#[async_trait]
impl PageRepository for PostgresPageRepository {
    async fn find_by_id(&self, id: &PageId) -> Result<Option<PageSubscription>, DomainError> {
        let row: Option<PageRow> =
            sqlx::query_as(&format!("SELECT {} FROM pages WHERE id = $1", PAGE_COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database(format!("Failed to load page: {}", e)))?;

        row.map(PageSubscription::try_from).transpose()
    }

    async fn find_by_provider_subscription_id(
        &self,
        provider: ProviderKind,
        subscription_id: &str,
    ) -> Result<Option<PageSubscription>, DomainError> {
        let row: Option<PageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM pages WHERE payment_provider = $1 AND provider_subscription_id = $2",
            PAGE_COLUMNS
        ))
        .bind(provider.as_str())
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to load page by subscription: {}", e))
        })?;

        row.map(PageSubscription::try_from).transpose()
    }

    async fn find_cancelling_due(
        &self,
        as_of: Timestamp,
    ) -> Result<Vec<PageSubscription>, DomainError> {
        let rows: Vec<PageRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM pages
            WHERE subscription_status = 'active'
              AND cancel_at_period_end
              AND current_period_end <= $1
            ORDER BY current_period_end
            "#,
            PAGE_COLUMNS
        ))
        .bind(*as_of.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to load cancelling pages: {}", e))
        })?;

        rows.into_iter().map(PageSubscription::try_from).collect()
    }

    async fn update_if_version(
        &self,
        page: &PageSubscription,
        expected_version: i64,
    ) -> Result<PageSubscription, DomainError> {
        let row: Option<PageRow> = sqlx::query_as(&format!(
            r#"
            UPDATE pages SET
                plan = $3,
                subscription_status = $4,
                cancel_at_period_end = $5,
                payment_provider = $6,
                provider_subscription_id = $7,
                current_period_end = $8,
                last_event_id = $9,
                last_event_sequence = $10,
                subscription_version = subscription_version + 1,
                subscription_updated_at = NOW()
            WHERE id = $1 AND subscription_version = $2
            RETURNING {}
            "#,
            PAGE_COLUMNS
        ))
        .bind(page.page_id.as_uuid())
        .bind(expected_version)
        .bind(page.plan.as_str())
        .bind(page.status.as_str())
        .bind(page.cancel_at_period_end)
        .bind(page.provider.map(|p| p.as_str()))
        .bind(&page.provider_subscription_id)
        .bind(page.current_period_end.map(|t| *t.as_datetime()))
        .bind(&page.last_event_id)
        .bind(page.last_event_sequence)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update page: {}", e)))?;

        if let Some(row) = row {
            return PageSubscription::try_from(row);
        }

        // Nothing matched: either the page is gone or another writer won.
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pages WHERE id = $1)")
            .bind(page.page_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to check page: {}", e)))?;

        if exists {
            Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                format!(
                    "page {} changed since version {}",
                    page.page_id, expected_version
                ),
            ))
        } else {
            Err(DomainError::new(
                ErrorCode::PageNotFound,
                page.page_id.to_string(),
            ))
        }
    }
}
