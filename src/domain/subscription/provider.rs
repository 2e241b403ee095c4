//! Payment provider identity.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// External payment processor owning a page's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Stripe,
    Mollie,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Stripe => "stripe",
            ProviderKind::Mollie => "mollie",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stripe" => Ok(ProviderKind::Stripe),
            "mollie" => Ok(ProviderKind::Mollie),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown payment provider '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
