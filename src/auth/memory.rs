//! In-process user store, used when no `DATABASE_URL` is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User},
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

fn collides<'a>(
    users: impl Iterator<Item = &'a User>,
    username: &str,
    email: &str,
) -> Option<&'a User> {
    let mut username_hit = None;
    for user in users {
        if user.email == email {
            return Some(user);
        }
        if username_hit.is_none() && user.username.to_lowercase() == username.to_lowercase() {
            username_hit = Some(user);
        }
    }
    username_hit
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let wanted = username.to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn find_conflict(&self, username: &str, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(collides(users.values(), username, email).cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if collides(users.values(), &new.username, &new.email).is_some() {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            age: new.age,
            refresh_token: None,
            last_login: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn store_refresh_token(
        &self,
        id: Uuid,
        token: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.refresh_token = Some(token.to_string());
        user.last_login = Some(at);
        Ok(true)
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if user.refresh_token.as_deref() == Some(current) => {
                user.refresh_token = Some(next.to_string());
                user.last_login = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_refresh_token(&self, id: Uuid) -> anyhow::Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.refresh_token = None;
        }
        Ok(())
    }
}
