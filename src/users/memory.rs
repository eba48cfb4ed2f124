use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::{
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User, UserPatch},
};

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    users: BTreeMap<i64, User>,
}

impl Inner {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// Process-local store. Every check-then-write runs under one write lock.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.access_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.inner.read().await.users.values().cloned().collect())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.email_taken(&user.email, None) {
            return Err(StoreError::DuplicateEmail);
        }
        inner.last_id += 1;
        let record = User {
            id: inner.last_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            access_token: None,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(email) = patch.email.as_deref() {
            if inner.email_taken(email, Some(id)) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.users.remove(&id).is_some())
    }

    async fn set_token(&self, id: i64, token: &str) -> Result<(), StoreError> {
        if let Some(user) = self.inner.write().await.users.get_mut(&id) {
            user.access_token = Some(token.to_owned());
        }
        Ok(())
    }

    async fn clear_token(&self, id: i64, token: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&id) {
            Some(user) if user.access_token.as_deref() == Some(token) => {
                user.access_token = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a", "a@x.com")).await.unwrap();
        let b = store.insert(new_user("b", "b@x.com")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(a.access_token.is_none());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.insert(new_user("a", "a@x.com")).await.unwrap();
        let err = store.insert(new_user("b", "a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() {
        let store = MemoryUserStore::new();
        store.insert(new_user("a", "a@x.com")).await.unwrap();
        assert!(store.find_by_email("A@x.com").await.unwrap().is_none());
        // distinct case is a distinct email
        store.insert(new_user("b", "A@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn update_applies_only_present_fields() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a", "a@x.com")).await.unwrap();
        let patch = UserPatch {
            name: Some("renamed".into()),
            ..UserPatch::default()
        };
        let updated = store.update(a.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.email, "a@x.com");
        assert_eq!(updated.password_hash, "hash");
    }

    #[tokio::test]
    async fn update_to_taken_email_fails() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a", "a@x.com")).await.unwrap();
        store.insert(new_user("b", "b@x.com")).await.unwrap();
        let patch = UserPatch {
            email: Some("b@x.com".into()),
            ..UserPatch::default()
        };
        let err = store.update(a.id, patch).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        // keeping one's own email is fine
        let same = UserPatch {
            email: Some("a@x.com".into()),
            ..UserPatch::default()
        };
        assert!(store.update(a.id, same).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_missing_user_returns_none() {
        let store = MemoryUserStore::new();
        assert!(store.update(42, UserPatch::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn token_set_lookup_and_compare_and_clear() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a", "a@x.com")).await.unwrap();
        store.set_token(a.id, "t1").await.unwrap();
        assert_eq!(store.find_by_token("t1").await.unwrap().unwrap().id, a.id);

        store.set_token(a.id, "t2").await.unwrap();
        assert!(store.find_by_token("t1").await.unwrap().is_none());

        // stale token does not clear the newer one
        assert!(!store.clear_token(a.id, "t1").await.unwrap());
        assert!(store.find_by_token("t2").await.unwrap().is_some());

        assert!(store.clear_token(a.id, "t2").await.unwrap());
        assert!(store.find_by_token("t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_record_and_its_token() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("a", "a@x.com")).await.unwrap();
        store.set_token(a.id, "t").await.unwrap();
        assert!(store.delete(a.id).await.unwrap());
        assert!(!store.delete(a.id).await.unwrap());
        assert!(store.find_by_id(a.id).await.unwrap().is_none());
        assert!(store.find_by_token("t").await.unwrap().is_none());
    }
}
