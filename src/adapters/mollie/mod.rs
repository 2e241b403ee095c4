//! Mollie payment gateway.
//!
//! # Configuration
//!
//! - `BIOLINK__PAYMENT__MOLLIE_API_KEY`: API key (live_... or test_...)
//! - `BIOLINK__PAYMENT__WEBHOOK_BASE_URL`: public base URL; Mollie posts to
//!   `{base}/api/webhooks/mollie`

mod api_types;
mod mollie_adapter;

pub use mollie_adapter::{MollieConfig, MolliePaymentAdapter};
