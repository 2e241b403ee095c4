//! User account as seen by billing.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;
use crate::domain::subscription::{ProviderKind, SubscriptionPlan};

/// A user of the page builder.
///
/// Authentication is handled upstream; billing only needs the email,
/// the admin flag and the provider customer references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub is_admin: bool,
    pub stripe_customer_id: Option<String>,
    pub mollie_customer_id: Option<String>,

    /// User-scoped plan from before plans moved onto pages.
    ///
    /// Read-only. Page plans are authoritative.
    pub legacy_plan: Option<SubscriptionPlan>,
}

impl User {
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            is_admin: false,
            stripe_customer_id: None,
            mollie_customer_id: None,
            legacy_plan: None,
        }
    }

    /// Provider customer id for `provider`, if one was created.
    pub fn customer_id(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::Stripe => self.stripe_customer_id.as_deref(),
            ProviderKind::Mollie => self.mollie_customer_id.as_deref(),
        }
    }

    pub fn set_customer_id(&mut self, provider: ProviderKind, customer_id: impl Into<String>) {
        let customer_id = Some(customer_id.into());
        match provider {
            ProviderKind::Stripe => self.stripe_customer_id = customer_id,
            ProviderKind::Mollie => self.mollie_customer_id = customer_id,
        }
    }
}
