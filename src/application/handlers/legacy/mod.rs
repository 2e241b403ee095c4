//! Deprecated user-scoped billing.

mod update_user_plan;

pub use update_user_plan::{
    UpdateUserPlanCommand, UpdateUserPlanHandler, UpdateUserPlanResult, REPLACEMENT_ROUTE,
};
