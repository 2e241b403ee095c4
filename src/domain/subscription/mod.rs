//! Subscription module - Page-scoped plans and their lifecycle.

mod errors;
mod event;
mod manager;
mod page;
mod plan;
mod pricing;
mod provider;
mod state;
mod status;

pub use errors::BillingError;
pub use event::{BillingEvent, SubscriptionEvent};
pub use manager::{apply_subscription_event, is_already_reflected, next_state, TransitionOutcome};
pub use page::PageSubscription;
pub use plan::SubscriptionPlan;
pub use pricing::{PlanCatalog, PlanPrice};
pub use provider::ProviderKind;
pub use state::{SubscriptionPhase, SubscriptionState};
pub use status::SubscriptionStatus;
