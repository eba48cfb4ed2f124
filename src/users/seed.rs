use tracing::{info, warn};

use crate::{
    auth::password::hash_password,
    users::{
        repo::{StoreError, UserStore},
        repo_types::NewUser,
    },
};

const SEED_COUNT: usize = 10;

/// Inserts `user1..user10` (`user{i}@web.tw` / `user{i}pass`), skipping taken emails.
pub async fn seed_users(store: &dyn UserStore) -> anyhow::Result<usize> {
    let mut inserted = 0;
    for i in 1..=SEED_COUNT {
        let email = format!("user{i}@web.tw");
        if store.find_by_email(&email).await?.is_some() {
            continue;
        }
        let user = NewUser {
            name: format!("user{i}"),
            email,
            password_hash: hash_password(&format!("user{i}pass"))?,
        };
        match store.insert(user).await {
            Ok(_) => inserted += 1,
            Err(StoreError::DuplicateEmail) => {}
            Err(e) => {
                warn!(error = %e, "seeding aborted");
                return Err(e.into());
            }
        }
    }
    info!(inserted, "seeded users");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password::verify_password, users::memory::MemoryUserStore};

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let store = MemoryUserStore::new();
        assert_eq!(seed_users(&store).await.unwrap(), SEED_COUNT);
        assert_eq!(seed_users(&store).await.unwrap(), 0);
        assert_eq!(store.list_all().await.unwrap().len(), SEED_COUNT);

        let u3 = store.find_by_email("user3@web.tw").await.unwrap().unwrap();
        assert_eq!(u3.name, "user3");
        assert!(verify_password("user3pass", &u3.password_hash).unwrap());
    }
}
