//! Discount code handlers.

mod create_discount_code;
mod list_discount_codes;
mod validate_discount_code;

pub use create_discount_code::{CreateDiscountCodeCommand, CreateDiscountCodeHandler};
pub use list_discount_codes::ListDiscountCodesHandler;
pub use validate_discount_code::{
    ValidateDiscountCodeHandler, ValidateDiscountCodeQuery, ValidateDiscountCodeResult,
};
