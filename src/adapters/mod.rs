//! Adapters - Implementations of port interfaces.
//!
//! - `http` - axum routes over the application handlers
//! - `memory` - in-process repositories and a scripted gateway for tests
//! - `mollie` - Mollie payments API gateway
//! - `postgres` - sqlx repositories
//! - `stripe` - Stripe API gateway with signed webhooks

pub mod http;
pub mod memory;
pub mod mollie;
pub mod postgres;
pub mod stripe;
