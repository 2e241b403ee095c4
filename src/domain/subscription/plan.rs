//! Subscription plan definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Subscription tier a page is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    /// Default plan for every new page. Never billed, never discounted.
    Free,

    /// Entry paid plan.
    Start,

    /// Full paid plan.
    Pro,
}

impl SubscriptionPlan {
    /// Paid plans, in display order.
    pub const PAID: [SubscriptionPlan; 2] = [SubscriptionPlan::Start, SubscriptionPlan::Pro];

    /// Returns true if this plan is billed through a provider.
    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionPlan::Free)
    }

    /// Returns the wire/storage name of this plan.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Start => "start",
            SubscriptionPlan::Pro => "pro",
        }
    }

    /// Parses a plan and requires it to be a paid one.
    pub fn parse_paid(s: &str) -> Result<Self, ValidationError> {
        let plan: SubscriptionPlan = s.parse()?;
        if !plan.is_paid() {
            return Err(ValidationError::invalid_format(
                "plan",
                "the free plan cannot be purchased or discounted",
            ));
        }
        Ok(plan)
    }
}

impl FromStr for SubscriptionPlan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(SubscriptionPlan::Free),
            "start" => Ok(SubscriptionPlan::Start),
            "pro" => Ok(SubscriptionPlan::Pro),
            "" => Err(ValidationError::empty_field("plan")),
            other => Err(ValidationError::invalid_format(
                "plan",
                format!("unknown plan '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
