//! In-memory user repository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::account::User;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::UserRepository;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn get(&self, id: &UserId) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let wanted = email.trim();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(wanted))
            .cloned())
    }

    async fn update(&self, user: &User) -> Result<(), DomainError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.id) {
            Some(stored) => {
                *stored = user.clone();
                Ok(())
            }
            None => Err(DomainError::new(ErrorCode::UserNotFound, user.id.to_string())),
        }
    }
}
