//! PostgreSQL implementation of DiscountCodeRepository.
//!
//! Redemptions live in `discount_redemptions`, keyed by code and checkout
//! session. Recording one locks the code row so the count and the limit
//! check cannot interleave with another webhook.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::discount::{DiscountCode, DiscountType, NormalizedCode};
use crate::domain::foundation::{DiscountCodeId, DomainError, ErrorCode, Timestamp};
use crate::domain::subscription::SubscriptionPlan;
use crate::ports::{DiscountCodeRepository, RedemptionOutcome};

use super::parse_column;

const CODE_COLUMNS: &str = r#"
    id, code, description, discount_type, discount_value, applicable_plans,
    max_redemptions, redemption_count, expires_at, active, created_at
"#;

pub struct PostgresDiscountCodeRepository {
    pool: PgPool,
}

impl PostgresDiscountCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DiscountCodeRow {
    id: Uuid,
    code: String,
    description: Option<String>,
    discount_type: String,
    discount_value: i64,
    applicable_plans: Vec<String>,
    max_redemptions: Option<i64>,
    redemption_count: i64,
    expires_at: Option<DateTime<Utc>>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<DiscountCodeRow> for DiscountCode {
    type Error = DomainError;

    fn try_from(row: DiscountCodeRow) -> Result<Self, Self::Error> {
        let applicable_plans = row
            .applicable_plans
            .iter()
            .map(|p| parse_column::<SubscriptionPlan>("applicable_plans", p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DiscountCode {
            id: DiscountCodeId::from_uuid(row.id),
            code: row.code,
            description: row.description,
            discount_type: DiscountType::parse(&row.discount_type).map_err(|e| {
                DomainError::database(format!("Invalid discount_type value: {}", e))
            })?,
            discount_value: row.discount_value,
            applicable_plans,
            max_redemptions: row.max_redemptions,
            redemption_count: row.redemption_count,
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            active: row.active,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RedemptionGuardRow {
    id: Uuid,
    max_redemptions: Option<i64>,
    redemption_count: i64,
}

#[async_trait]
impl DiscountCodeRepository for PostgresDiscountCodeRepository {
    async fn list_all(&self) -> Result<Vec<DiscountCode>, DomainError> {
        let rows: Vec<DiscountCodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM discount_codes ORDER BY created_at DESC",
            CODE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list discount codes: {}", e)))?;

        rows.into_iter().map(DiscountCode::try_from).collect()
    }

    async fn find_by_code(
        &self,
        code: &NormalizedCode,
    ) -> Result<Option<DiscountCode>, DomainError> {
        let row: Option<DiscountCodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM discount_codes WHERE code = $1",
            CODE_COLUMNS
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load discount code: {}", e)))?;

        row.map(DiscountCode::try_from).transpose()
    }

    async fn create(&self, code: &DiscountCode) -> Result<(), DomainError> {
        let plans: Vec<&str> = code.applicable_plans.iter().map(|p| p.as_str()).collect();

        sqlx::query(
            r#"
            INSERT INTO discount_codes (
                id, code, description, discount_type, discount_value, applicable_plans,
                max_redemptions, redemption_count, expires_at, active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(code.id.as_uuid())
        .bind(&code.code)
        .bind(&code.description)
        .bind(code.discount_type.as_str())
        .bind(code.discount_value)
        .bind(&plans)
        .bind(code.max_redemptions)
        .bind(code.redemption_count)
        .bind(code.expires_at.as_ref().map(|t| *t.as_datetime()))
        .bind(code.active)
        .bind(code.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("discount_codes_code_key") {
                    return DomainError::new(
                        ErrorCode::DiscountCodeExists,
                        format!("discount code {} already exists", code.code),
                    );
                }
            }
            DomainError::database(format!("Failed to save discount code: {}", e))
        })?;

        Ok(())
    }

    async fn record_redemption(
        &self,
        code: &NormalizedCode,
        checkout_session_id: &str,
    ) -> Result<RedemptionOutcome, DomainError> {
        let db_err = |e: sqlx::Error| {
            DomainError::database(format!("Failed to record redemption: {}", e))
        };

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let guard: Option<RedemptionGuardRow> = sqlx::query_as(
            r#"
            SELECT id, max_redemptions, redemption_count
            FROM discount_codes WHERE code = $1
            FOR UPDATE
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let guard = guard.ok_or_else(|| {
            DomainError::new(ErrorCode::DiscountCodeNotFound, code.as_str().to_string())
        })?;

        let already: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM discount_redemptions
                WHERE discount_code_id = $1 AND checkout_session_id = $2
            )
            "#,
        )
        .bind(guard.id)
        .bind(checkout_session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        if already {
            return Ok(RedemptionOutcome::AlreadyRecorded);
        }

        let over_limit = guard
            .max_redemptions
            .map_or(false, |max| guard.redemption_count >= max);

        sqlx::query(
            r#"
            INSERT INTO discount_redemptions (discount_code_id, checkout_session_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(guard.id)
        .bind(checkout_session_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("UPDATE discount_codes SET redemption_count = redemption_count + 1 WHERE id = $1")
            .bind(guard.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(if over_limit {
            RedemptionOutcome::RecordedOverLimit
        } else {
            RedemptionOutcome::Recorded
        })
    }
}
