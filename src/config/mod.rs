//! Application configuration
//!
//! Loaded from environment variables with the `config` and `dotenvy`
//! crates. Variables use the `BIOLINK` prefix and `__` between nested
//! keys.
//!
//! # Example
//!
//! ```no_run
//! use biolink_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod payment;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads `BIOLINK__*` variables, `__` separating nested keys
    ///
    /// - `BIOLINK__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `BIOLINK__PAYMENT__PROVIDER=mollie` -> `payment.provider = mollie`
    ///
    /// # Errors
    ///
    /// `ConfigError` if a required variable is missing or a value does not
    /// parse.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("BIOLINK")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate(self.is_production())?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::ProviderKind;
    use std::env;
    use std::sync::Mutex;

    // Environment variables are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 8] = [
        "BIOLINK__DATABASE__URL",
        "BIOLINK__PAYMENT__STRIPE_API_KEY",
        "BIOLINK__PAYMENT__STRIPE_WEBHOOK_SECRET",
        "BIOLINK__PAYMENT__STRIPE_PRICE_START",
        "BIOLINK__PAYMENT__STRIPE_PRICE_PRO",
        "BIOLINK__PAYMENT__PROVIDER",
        "BIOLINK__SERVER__PORT",
        "BIOLINK__SERVER__ENVIRONMENT",
    ];

    fn set_minimal_env() {
        env::set_var("BIOLINK__DATABASE__URL", "postgresql://test@localhost/biolink");
        env::set_var("BIOLINK__PAYMENT__STRIPE_API_KEY", "sk_test_xxx");
        env::set_var("BIOLINK__PAYMENT__STRIPE_WEBHOOK_SECRET", "whsec_xxx");
        env::set_var("BIOLINK__PAYMENT__STRIPE_PRICE_START", "price_start");
        env::set_var("BIOLINK__PAYMENT__STRIPE_PRICE_PRO", "price_pro");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn loads_and_validates_minimal_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert_eq!(config.database.url, "postgresql://test@localhost/biolink");
        assert_eq!(config.payment.provider, ProviderKind::Stripe);
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nested_values_override_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("BIOLINK__SERVER__PORT", "3000"),
            ("BIOLINK__SERVER__ENVIRONMENT", "production"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
    }

    #[test]
    fn selecting_unconfigured_provider_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[("BIOLINK__PAYMENT__PROVIDER", "mollie")]).unwrap();

        assert_eq!(config.payment.provider, ProviderKind::Mollie);
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("PAYMENT__MOLLIE_API_KEY"))
        );
    }
}
