//! Persisted subscription status column.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Subscription status as stored on a page.
///
/// Only meaningful when the plan is paid; a free page is always `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    None,
    Active,
    Cancelled,
    PastDue,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::PastDue => "past_due",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SubscriptionStatus::None),
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
