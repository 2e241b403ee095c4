//! Payment provider configuration
//!
//! `provider` picks the gateway new checkouts go through. The other
//! provider stays wired up when its keys are present, so webhooks and
//! cancellations for pages it already bills keep working.

use serde::Deserialize;

use crate::domain::subscription::{PlanCatalog, PlanPrice, ProviderKind};

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Provider for new checkouts
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Stripe secret key (sk_...)
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe webhook signing secret (whsec_...)
    #[serde(default)]
    pub stripe_webhook_secret: String,

    /// Stripe recurring price id for the start plan
    #[serde(default)]
    pub stripe_price_start: String,

    /// Stripe recurring price id for the pro plan
    #[serde(default)]
    pub stripe_price_pro: String,

    /// Reject Stripe test-mode events
    #[serde(default)]
    pub stripe_require_livemode: bool,

    /// Mollie API key (live_... or test_...)
    #[serde(default)]
    pub mollie_api_key: String,

    /// Public base URL providers call back on
    pub webhook_base_url: Option<String>,

    /// ISO 4217 currency of the plan prices
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Start plan price in minor units
    #[serde(default = "default_start_price")]
    pub start_price: i64,

    /// Pro plan price in minor units
    #[serde(default = "default_pro_price")]
    pub pro_price: i64,
}

impl PaymentConfig {
    pub fn catalog(&self) -> PlanCatalog {
        let currency = self.currency.to_uppercase();
        PlanCatalog {
            start: PlanPrice {
                amount: self.start_price,
                currency: currency.clone(),
            },
            pro: PlanPrice {
                amount: self.pro_price,
                currency,
            },
        }
    }

    pub fn stripe_enabled(&self) -> bool {
        !self.stripe_api_key.is_empty()
    }

    pub fn mollie_enabled(&self) -> bool {
        !self.mollie_api_key.is_empty()
    }

    pub fn is_enabled(&self, provider: ProviderKind) -> bool {
        match provider {
            ProviderKind::Stripe => self.stripe_enabled(),
            ProviderKind::Mollie => self.mollie_enabled(),
        }
    }

    /// URL Mollie posts payment status changes to.
    pub fn mollie_webhook_url(&self) -> Option<String> {
        self.webhook_base_url
            .as_deref()
            .map(|base| format!("{}/api/webhooks/mollie", base.trim_end_matches('/')))
    }

    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if !self.is_enabled(self.provider) {
            return Err(ValidationError::MissingRequired(match self.provider {
                ProviderKind::Stripe => "PAYMENT__STRIPE_API_KEY",
                ProviderKind::Mollie => "PAYMENT__MOLLIE_API_KEY",
            }));
        }

        if self.stripe_enabled() {
            if !self.stripe_api_key.starts_with("sk_") {
                return Err(ValidationError::InvalidStripeKey);
            }
            if self.stripe_webhook_secret.is_empty() {
                return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"));
            }
            if !self.stripe_webhook_secret.starts_with("whsec_") {
                return Err(ValidationError::InvalidStripeWebhookSecret);
            }
            if self.stripe_price_start.is_empty() {
                return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_PRICE_START"));
            }
            if self.stripe_price_pro.is_empty() {
                return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_PRICE_PRO"));
            }
        }

        if self.mollie_enabled() {
            if !self.mollie_api_key.starts_with("live_") && !self.mollie_api_key.starts_with("test_")
            {
                return Err(ValidationError::InvalidMollieKey);
            }
            let base = self
                .webhook_base_url
                .as_deref()
                .ok_or(ValidationError::MissingRequired("PAYMENT__WEBHOOK_BASE_URL"))?;
            if production && !base.starts_with("https://") {
                return Err(ValidationError::WebhookUrlMustBeHttps);
            }
        }

        if self.start_price <= 0 || self.pro_price <= 0 {
            return Err(ValidationError::InvalidPlanPrice);
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency);
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_price_start: String::new(),
            stripe_price_pro: String::new(),
            stripe_require_livemode: false,
            mollie_api_key: String::new(),
            webhook_base_url: None,
            currency: default_currency(),
            start_price: default_start_price(),
            pro_price: default_pro_price(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Stripe
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_start_price() -> i64 {
    500
}

fn default_pro_price() -> i64 {
    1200
}
