//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresPageRepository` - Subscription columns of `pages`
//! - `PostgresUserRepository` - Users and provider customer ids
//! - `PostgresDiscountCodeRepository` - Codes and per-session redemptions
//! - `PostgresWebhookEventRepository` - Processed webhook log
//!
//! Schema: `migrations/0001_billing.sql`. Enums are stored as their
//! snake_case names.

mod discount_code_repository;
mod page_repository;
mod user_repository;
mod webhook_event_repository;

pub use discount_code_repository::PostgresDiscountCodeRepository;
pub use page_repository::PostgresPageRepository;
pub use user_repository::PostgresUserRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;

use std::fmt::Display;
use std::str::FromStr;

use crate::domain::foundation::DomainError;

/// Parses a text column into a domain enum. A bad value means the row is
/// corrupt, so it surfaces as a database error.
fn parse_column<T>(column: &str, value: &str) -> Result<T, DomainError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| {
        DomainError::database(format!("Invalid {} value '{}': {}", column, value, e))
    })
}
