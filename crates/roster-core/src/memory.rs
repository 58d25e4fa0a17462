//! In-memory user store for tests
//!
//! Mirrors the SQL store's observable behavior: sequential ids, unique
//! emails, newest-first listing and `NotFound` on missing rows.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::{NewUser, StoreError, StoreResult, User, UserRepository};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<i64, User>,
}

/// `UserRepository` test double
#[derive(Default)]
pub struct MemoryUserRepository {
    inner: RwLock<Inner>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(inner: &Inner, email: &str, except: Option<i64>) -> bool {
    inner
        .users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if email_taken(&inner, &user.email, None) {
            return Err(StoreError::Conflict(format!("email {} exists", user.email)));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let stored = User {
            id: inner.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            age: user.age,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<User> {
        self.inner
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<User> {
        self.inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_all(&self) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users)
    }

    async fn update(&self, id: i64, user: &User) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if email_taken(&inner, &user.email, Some(id)) {
            return Err(StoreError::Conflict(format!("email {} exists", user.email)));
        }

        let entry = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        entry.name = user.name.clone();
        entry.email = user.email.clone();
        entry.password_hash = user.password_hash.clone();
        entry.age = user.age;
        entry.role = user.role;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.inner.read().await.users.len() as i64)
    }
}
