//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `account` - Users and their payment provider customer references
//! - `subscription` - Page-scoped plans and the subscription lifecycle
//! - `discount` - Discount codes and the evaluator

pub mod account;
pub mod discount;
pub mod foundation;
pub mod subscription;
