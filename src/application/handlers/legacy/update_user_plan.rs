//! UpdateUserPlanHandler - Deprecated user-scoped plan update.
//!
//! Plans belong to pages. The old endpoint that set a plan on the user is
//! kept only to tell callers where to go; it never writes.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{BillingError, SubscriptionPlan};
use crate::ports::UserRepository;

/// Route callers should use instead.
pub const REPLACEMENT_ROUTE: &str = "/api/pages/{page_id}/subscription/checkout";

#[derive(Debug, Clone)]
pub struct UpdateUserPlanCommand {
    pub email: String,
    pub plan: String,
}

/// Deprecation notice returned in place of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUserPlanResult {
    pub user_id: UserId,
    pub requested_plan: SubscriptionPlan,
    pub replacement: &'static str,
}

pub struct UpdateUserPlanHandler {
    users: Arc<dyn UserRepository>,
}

impl UpdateUserPlanHandler {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub async fn handle(&self, cmd: UpdateUserPlanCommand) -> Result<UpdateUserPlanResult, BillingError> {
        let email = cmd.email.trim();
        if email.is_empty() {
            return Err(BillingError::invalid_input("email", "must not be empty"));
        }
        let requested_plan: SubscriptionPlan = cmd.plan.parse()?;

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| BillingError::not_found("user", email))?;

        tracing::warn!(
            user_id = %user.id,
            requested_plan = %requested_plan,
            legacy_plan = ?user.legacy_plan,
            "Deprecated user-scoped plan update called"
        );

        Ok(UpdateUserPlanResult {
            user_id: user.id,
            requested_plan,
            replacement: REPLACEMENT_ROUTE,
        })
    }
}
