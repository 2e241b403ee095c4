//! Discount module - Codes and the evaluator that prices them.

mod code;
mod discount_code;
mod evaluator;

pub use code::NormalizedCode;
pub use discount_code::{DiscountCode, DiscountType, NewDiscountCode};
pub use evaluator::{evaluate_discount_code, AppliedDiscount, DiscountDecision, InvalidReason};
