//! In-memory adapters.
//!
//! Map-backed stores and a scriptable payment gateway for unit tests and
//! the HTTP integration tests.

mod discount_code_repository;
mod page_repository;
mod payment_gateway;
mod user_repository;
mod webhook_event_repository;

pub use discount_code_repository::InMemoryDiscountCodeRepository;
pub use page_repository::InMemoryPageRepository;
pub use payment_gateway::{MethodCall, MockPaymentGateway};
pub use user_repository::InMemoryUserRepository;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
