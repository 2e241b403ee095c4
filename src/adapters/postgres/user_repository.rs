//! PostgreSQL implementation of UserRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::account::User;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::subscription::SubscriptionPlan;
use crate::ports::UserRepository;

use super::parse_column;

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    is_admin: bool,
    stripe_customer_id: Option<String>,
    mollie_customer_id: Option<String>,
    plan: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::new(row.id)
                .map_err(|e| DomainError::database(format!("Invalid user id: {}", e)))?,
            email: row.email,
            is_admin: row.is_admin,
            stripe_customer_id: row.stripe_customer_id,
            mollie_customer_id: row.mollie_customer_id,
            legacy_plan: row
                .plan
                .as_deref()
                .map(|p| parse_column::<SubscriptionPlan>("plan", p))
                .transpose()?,
        })
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, is_admin, stripe_customer_id, mollie_customer_id, plan
            FROM users WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load user: {}", e)))?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, is_admin, stripe_customer_id, mollie_customer_id, plan
            FROM users WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load user by email: {}", e)))?;

        row.map(User::try_from).transpose()
    }

    async fn update(&self, user: &User) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                stripe_customer_id = $2,
                mollie_customer_id = $3
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.stripe_customer_id)
        .bind(&user.mollie_customer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update user: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(ErrorCode::UserNotFound, user.id.to_string()));
        }
        Ok(())
    }
}
