// src/db/repositories/user_repository.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::db::StoreError;
use crate::models::{normalize_username, UserId, UserProfile};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; usernames must be unique ignoring case
    async fn create(&self, user: &UserProfile) -> Result<UserProfile, StoreError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>, StoreError>;
    /// All users, oldest first
    async fn list(&self) -> Result<Vec<UserProfile>, StoreError>;
    async fn delete(&self, id: UserId) -> Result<(), StoreError>;
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError>;
}

pub(crate) fn sort_users(users: &mut [UserProfile]) {
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.username.cmp(&b.username)));
}

/// Process-local user store
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, UserProfile>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &UserProfile) -> Result<UserProfile, StoreError> {
        let mut users = self.users.write();

        let key = user.username_key();
        if users.values().any(|existing| existing.username_key() == key) {
            return Err(StoreError::UsernameTaken(user.username.clone()));
        }

        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>, StoreError> {
        let key = normalize_username(username);
        Ok(self.users.read().values().find(|user| user.username_key() == key).cloned())
    }

    async fn list(&self) -> Result<Vec<UserProfile>, StoreError> {
        let mut users: Vec<UserProfile> = self.users.read().values().cloned().collect();
        sort_users(&mut users);
        Ok(users)
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        self.users
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let user = users.get_mut(&id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        user.last_login = Some(at);
        Ok(())
    }
}
