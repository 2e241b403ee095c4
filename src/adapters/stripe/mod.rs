//! Stripe payment gateway.
//!
//! Checkout sessions, cancellation and signed webhooks for page
//! subscriptions billed through Stripe.
//!
//! # Configuration
//!
//! - `BIOLINK__PAYMENT__STRIPE_API_KEY`: secret API key
//! - `BIOLINK__PAYMENT__STRIPE_WEBHOOK_SECRET`: webhook signing secret (whsec_...)
//! - `BIOLINK__PAYMENT__STRIPE_PRICE_START` / `..._PRICE_PRO`: recurring price ids

mod stripe_adapter;
mod webhook_types;

pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_types::{SignatureHeader, SignatureParseError};
