//! User repository port.

use async_trait::async_trait;

use crate::domain::account::User;
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Persist provider customer references.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, user: &User) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn UserRepository) {}
    }
}
