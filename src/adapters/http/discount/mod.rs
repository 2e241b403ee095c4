//! HTTP adapter for discount codes.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    CreateDiscountRequest, DiscountCodeListResponse, ValidateDiscountRequest,
    ValidateDiscountResponse,
};
pub use routes::{admin_discount_routes, discount_routes};
