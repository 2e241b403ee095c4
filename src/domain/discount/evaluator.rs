//! Discount code evaluator.
//!
//! Decides whether a code is currently valid for a plan and what it takes
//! off the base price. Evaluation is read-only.

use serde::{Serialize, Serializer};

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{BillingError, SubscriptionPlan};

use super::{DiscountCode, DiscountType, NormalizedCode};

/// Why a code was refused. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    NotFound,
    Inactive,
    NotApplicableToPlan,
    Expired,
    RedemptionLimitReached,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::NotFound => "not found",
            InvalidReason::Inactive => "inactive",
            InvalidReason::NotApplicableToPlan => "not applicable to plan",
            InvalidReason::Expired => "expired",
            InvalidReason::RedemptionLimitReached => "redemption limit reached",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for InvalidReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome of evaluating a code against a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountDecision {
    Valid(AppliedDiscount),
    Invalid { reason: InvalidReason },
}

/// A discount that passed every check, priced against a base price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedDiscount {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub base_price: i64,
    pub effective_discount: i64,
    pub final_price: i64,
}

impl DiscountDecision {
    pub fn is_valid(&self) -> bool {
        matches!(self, DiscountDecision::Valid(_))
    }
}

/// Evaluates `code` for `plan` against a candidate set of stored codes.
///
/// `candidates` may be the full code list or the result of a store lookup;
/// matching is case-insensitive and exact. First failing check wins:
/// not found, inactive, not applicable to plan, expired, redemption limit.
///
/// # Errors
///
/// `InvalidInput` for a blank code, the free plan, or a negative base price.
pub fn evaluate_discount_code<'a>(
    code: &str,
    plan: SubscriptionPlan,
    base_price: i64,
    now: Timestamp,
    candidates: impl IntoIterator<Item = &'a DiscountCode>,
) -> Result<DiscountDecision, BillingError> {
    let wanted = NormalizedCode::for_lookup(code)?;

    if !plan.is_paid() {
        return Err(BillingError::invalid_input(
            "plan",
            "the free plan cannot be discounted",
        ));
    }
    if base_price < 0 {
        return Err(BillingError::invalid_input(
            "base_price",
            "must not be negative",
        ));
    }

    let found = match candidates.into_iter().find(|c| wanted.matches(&c.code)) {
        Some(found) => found,
        None => return Ok(invalid(InvalidReason::NotFound)),
    };

    if !found.active {
        return Ok(invalid(InvalidReason::Inactive));
    }
    if !found.applies_to(plan) {
        return Ok(invalid(InvalidReason::NotApplicableToPlan));
    }
    if found.is_expired(now) {
        return Ok(invalid(InvalidReason::Expired));
    }
    if found.limit_reached() {
        return Ok(invalid(InvalidReason::RedemptionLimitReached));
    }

    let effective_discount = found.effective_discount(base_price);
    Ok(DiscountDecision::Valid(AppliedDiscount {
        code: found.code.clone(),
        discount_type: found.discount_type,
        discount_value: found.discount_value,
        base_price,
        effective_discount,
        final_price: base_price - effective_discount,
    }))
}

fn invalid(reason: InvalidReason) -> DiscountDecision {
    DiscountDecision::Invalid { reason }
}
