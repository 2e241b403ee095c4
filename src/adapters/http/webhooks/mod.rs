//! Provider webhook endpoints.
//!
//! Any 2xx tells the provider to stop retrying, so only authentic
//! deliveries that were handled (or safely ignored) answer 200.

mod handlers;
mod routes;

pub use handlers::WebhookResponse;
pub use routes::webhook_routes;
