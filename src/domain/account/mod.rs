//! Account module - Users and their provider customer references.

mod user;

pub use user::User;
