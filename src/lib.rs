//! Biolink Billing - Subscription and discount backend for a link-in-bio
//! page builder.
//!
//! Pages carry their own plan. Plans are bought through Stripe or Mollie,
//! optionally with a discount code, and move through their lifecycle in
//! response to owner actions and provider webhooks.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
