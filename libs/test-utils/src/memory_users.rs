use std::{
    collections::BTreeSet,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use common::{
    error::{DatabaseError, RepositoryError, RepositoryResult},
    models::{NewUser, User, normalize_handle},
    repositories::UserRepository,
};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    /// (user_id, subscriber_id)
    subscriptions: BTreeSet<(i64, i64)>,
    next_id: i64,
}

/// In-memory user repository enforcing the same uniqueness rules as the
/// PostgreSQL schema
#[derive(Default)]
pub struct MemoryUserRepository {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of a stored user, bypassing availability
    pub fn get(&self, id: i64) -> Option<User> {
        let inner = self.inner.lock().unwrap();
        inner.users.iter().find(|u| u.id == id).cloned()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.lock().unwrap().subscriptions.len()
    }

    fn ensure_available(&self) -> RepositoryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(DatabaseError::Connection(
                sqlx::Error::PoolTimedOut,
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, new_user: &NewUser) -> RepositoryResult<User> {
        self.ensure_available()?;
        let telegram = normalize_handle(&new_user.telegram);
        let mut inner = self.inner.lock().unwrap();

        if inner
            .users
            .iter()
            .any(|u| u.username == new_user.username || u.telegram == telegram)
        {
            return Err(RepositoryError::AlreadyExists);
        }

        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            username: new_user.username.clone(),
            first_name: new_user.first_name.clone(),
            middle_name: new_user.middle_name.clone(),
            last_name: new_user.last_name.clone(),
            birthday: new_user.birthday,
            telegram,
            telegram_id: None,
            password_hash: new_user.password_hash.clone(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        self.ensure_available()?;
        Ok(self.get(id))
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        self.ensure_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_telegram(&self, handle: &str) -> RepositoryResult<Option<User>> {
        self.ensure_available()?;
        let handle = normalize_handle(handle);
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.telegram == handle).cloned())
    }

    async fn list(&self) -> RepositoryResult<Vec<User>> {
        self.ensure_available()?;
        Ok(self.inner.lock().unwrap().users.clone())
    }

    async fn set_subscription(
        &self,
        user_id: i64,
        subscriber_id: i64,
        active: bool,
    ) -> RepositoryResult<User> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().unwrap();

        let user = inner
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;

        if active {
            if !inner.users.iter().any(|u| u.id == subscriber_id) {
                return Err(RepositoryError::NotFound);
            }
            inner.subscriptions.insert((user_id, subscriber_id));
        } else {
            inner.subscriptions.remove(&(user_id, subscriber_id));
        }

        Ok(user)
    }

    async fn list_subscribers(&self, user_id: i64) -> RepositoryResult<Vec<User>> {
        self.ensure_available()?;
        let inner = self.inner.lock().unwrap();
        let subscribers = inner
            .subscriptions
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .filter_map(|(_, subscriber)| inner.users.iter().find(|u| u.id == *subscriber))
            .cloned()
            .collect();
        Ok(subscribers)
    }

    async fn find_by_birthday(&self, month: u32, day: u32) -> RepositoryResult<Vec<User>> {
        self.ensure_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .iter()
            .filter(|u| u.has_birthday_on(month, day))
            .cloned()
            .collect())
    }

    async fn bind_telegram_account(&self, telegram_id: i64, handle: &str) -> RepositoryResult<()> {
        self.ensure_available()?;
        let handle = normalize_handle(handle);
        let mut inner = self.inner.lock().unwrap();

        if inner
            .users
            .iter()
            .any(|u| u.telegram_id == Some(telegram_id) && u.telegram != handle)
        {
            return Err(RepositoryError::AlreadyExists);
        }

        let user = inner
            .users
            .iter_mut()
            .find(|u| u.telegram == handle)
            .ok_or(RepositoryError::NotFound)?;
        match user.telegram_id {
            Some(bound) if bound != telegram_id => Err(RepositoryError::AlreadyExists),
            _ => {
                user.telegram_id = Some(telegram_id);
                Ok(())
            }
        }
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{date, new_user};

    #[tokio::test]
    async fn uniqueness_matches_schema() {
        let repo = MemoryUserRepository::new();
        repo.create(&new_user("anna", date(1990, 6, 15))).await.unwrap();

        let mut clash = new_user("anna", date(1991, 1, 1));
        clash.telegram = "@someone_else".to_string();
        assert!(matches!(
            repo.create(&clash).await,
            Err(RepositoryError::AlreadyExists)
        ));

        let mut handle_clash = new_user("boris", date(1991, 1, 1));
        handle_clash.telegram = "anna".to_string();
        assert!(matches!(
            repo.create(&handle_clash).await,
            Err(RepositoryError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn telegram_account_binds_once_per_user() {
        let repo = MemoryUserRepository::new();
        let anna = repo.create(&new_user("anna", date(1990, 6, 15))).await.unwrap();
        repo.create(&new_user("boris", date(1990, 6, 15))).await.unwrap();

        repo.bind_telegram_account(100, "anna").await.unwrap();
        repo.bind_telegram_account(100, "@anna").await.unwrap();
        assert_eq!(repo.get(anna.id).unwrap().telegram_id, Some(100));

        assert!(matches!(
            repo.bind_telegram_account(100, "@boris").await,
            Err(RepositoryError::AlreadyExists)
        ));
        assert!(matches!(
            repo.bind_telegram_account(5, "@ghost").await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn bound_account_cannot_be_replaced() {
        let repo = MemoryUserRepository::new();
        let anna = repo.create(&new_user("anna", date(1990, 6, 15))).await.unwrap();
        repo.bind_telegram_account(42, "@anna").await.unwrap();

        assert!(matches!(
            repo.bind_telegram_account(99, "@anna").await,
            Err(RepositoryError::AlreadyExists)
        ));
        assert_eq!(repo.get(anna.id).unwrap().telegram_id, Some(42));
    }
}
