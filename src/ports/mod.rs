//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Store Ports
//!
//! - `PageRepository` - Page subscription columns with version-checked updates
//! - `UserRepository` - Users and provider customer references
//! - `DiscountCodeRepository` - Discount codes and per-session redemptions
//! - `WebhookEventRepository` - Processed webhook log for idempotency
//!
//! ## Provider Ports
//!
//! - `PaymentGateway` - Stripe / Mollie checkout, cancellation and webhooks

mod discount_code_repository;
mod page_repository;
mod payment_gateway;
mod user_repository;
mod webhook_event_repository;

pub use discount_code_repository::{DiscountCodeRepository, RedemptionOutcome};
pub use page_repository::PageRepository;
pub use payment_gateway::{
    CancelRequest, CancelledSubscription, CheckoutRequest, CheckoutSession, CustomerRequest,
    PageLocator, PaymentError, PaymentErrorCode, PaymentGateway, TranslatedEvent,
    WebhookTranslation,
};
pub use user_repository::UserRepository;
pub use webhook_event_repository::{
    ProcessingResult, SaveResult, WebhookEventRecord, WebhookEventRepository,
};
