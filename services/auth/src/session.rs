//! Session management using Redis
//!
//! A session is stored as JSON under `session:{token}` with a TTL. Tokens are
//! generated here, never supplied by clients, and carry enough randomness that
//! they cannot be guessed or enumerated. Lookups never refresh the TTL, so a
//! session expires at a fixed time after creation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{cache::KeyValueStore, error::CacheError};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

const SESSION_KEY_PREFIX: &str = "session:";

/// Length of generated tokens; 48 alphanumeric characters carry ~285 bits
pub const TOKEN_LENGTH: usize = 48;

/// Session entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub login: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// New session creation payload
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub login: String,
    pub user_agent: String,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session lifetime in seconds
    pub ttl_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 86_400, // 24 hours
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    StoreUnavailable(#[from] CacheError),
}

/// Session manager for handling user sessions in Redis
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(store: Arc<dyn KeyValueStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// Create a new session and return it with its freshly generated token
    pub async fn create(&self, new_session: NewSession) -> Result<Session, SessionError> {
        let session = Session {
            token: generate_token(),
            user_id: new_session.user_id,
            login: new_session.login,
            user_agent: new_session.user_agent,
            created_at: Utc::now(),
        };

        let value = serde_json::to_string(&session).map_err(CacheError::from)?;
        self.store
            .set(
                &session_key(&session.token),
                &value,
                Some(self.config.ttl_seconds),
            )
            .await?;

        info!("Created session for user: {}", session.user_id);
        Ok(session)
    }

    /// Look up a session by token
    ///
    /// Unknown, expired and malformed tokens all yield `Ok(None)`; only a
    /// store failure is an error.
    pub async fn check(&self, token: &str) -> Result<Option<Session>, SessionError> {
        if !is_well_formed(token) {
            debug!("Rejecting malformed session token");
            return Ok(None);
        }

        let Some(value) = self.store.get(&session_key(token)).await? else {
            debug!("No session for presented token");
            return Ok(None);
        };

        match serde_json::from_str::<Session>(&value) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("Discarding unreadable session record: {}", e);
                Ok(None)
            }
        }
    }

    /// Invalidate a session; invalidating an unknown token succeeds
    pub async fn invalidate(&self, token: &str) -> Result<(), SessionError> {
        if !is_well_formed(token) {
            return Ok(());
        }

        self.store.delete(&session_key(token)).await?;
        info!("Invalidated session");
        Ok(())
    }

    /// Get session store health status
    pub async fn health_check(&self) -> Result<bool, SessionError> {
        Ok(self.store.health_check().await?)
    }

    /// Session lifetime in seconds
    pub fn ttl_seconds(&self) -> u64 {
        self.config.ttl_seconds
    }
}

fn session_key(token: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, token)
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use super::*;
    use test_utils::MemoryStore;
    use tokio_test::{assert_err, assert_ok};

    fn manager(store: Arc<MemoryStore>, ttl_seconds: u64) -> SessionManager {
        SessionManager::new(store, SessionConfig { ttl_seconds })
    }

    fn new_session(user_id: i64) -> NewSession {
        NewSession {
            user_id,
            login: format!("user{}", user_id),
            user_agent: "curl/8.0".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_check_returns_the_session() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), 60);

        let created = sessions.create(new_session(7)).await.unwrap();
        assert_eq!(created.token.len(), TOKEN_LENGTH);
        assert_eq!(store.writes(), 1);

        let found = sessions.check(&created.token).await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let sessions = manager(Arc::new(MemoryStore::new()), 60);
        let mut tokens = HashSet::new();
        for user_id in 0..100 {
            let session = sessions.create(new_session(user_id)).await.unwrap();
            assert!(tokens.insert(session.token));
        }
    }

    #[tokio::test]
    async fn unknown_and_malformed_tokens_are_absent() {
        let sessions = manager(Arc::new(MemoryStore::new()), 60);
        assert_eq!(sessions.check("").await.unwrap(), None);
        assert_eq!(sessions.check("short").await.unwrap(), None);
        assert_eq!(sessions.check(&"x".repeat(TOKEN_LENGTH)).await.unwrap(), None);
        assert_eq!(
            sessions
                .check(&format!("{}*", "a".repeat(TOKEN_LENGTH - 1)))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_reads_as_absent() {
        let sessions = manager(Arc::new(MemoryStore::new()), 30);
        let created = sessions.create(new_session(1)).await.unwrap();

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(sessions.check(&created.token).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(sessions.check(&created.token).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn check_does_not_extend_lifetime() {
        let sessions = manager(Arc::new(MemoryStore::new()), 30);
        let created = sessions.create(new_session(1)).await.unwrap();

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(5)).await;
            assert!(sessions.check(&created.token).await.unwrap().is_some());
        }

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(sessions.check(&created.token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupted_record_reads_as_absent() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), 60);
        let token = "a".repeat(TOKEN_LENGTH);
        store
            .set(&session_key(&token), "{not json", Some(60))
            .await
            .unwrap();

        assert_eq!(sessions.check(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_removes_the_session() {
        let sessions = manager(Arc::new(MemoryStore::new()), 60);
        let created = sessions.create(new_session(3)).await.unwrap();

        assert_ok!(sessions.invalidate(&created.token).await);
        assert_eq!(sessions.check(&created.token).await.unwrap(), None);
        assert_ok!(sessions.invalidate(&created.token).await);
    }

    #[tokio::test]
    async fn store_outage_is_an_error_not_an_absence() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), 60);
        let created = sessions.create(new_session(1)).await.unwrap();

        store.set_unavailable(true);
        assert_err!(sessions.check(&created.token).await);
        assert_err!(sessions.create(new_session(2)).await);
        assert!(!sessions.health_check().await.unwrap());
    }
}
