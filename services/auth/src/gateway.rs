//! Authentication gateway
//!
//! Validates credentials through the user repository, issues sessions through
//! the session manager and resolves bearer tokens on protected operations.

use std::sync::Arc;

use common::{
    models::NewUser, password::hash_password_blocking, repositories::UserRepository,
};
use tracing::{debug, info, warn};

use crate::{
    error::AuthError,
    session::{NewSession, Session, SessionManager},
    validation::{LoginForm, RegistrationForm, validate_login, validate_registration},
};

/// Scheme prefix accepted in the `Authorization` header
pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Clone)]
pub struct AuthGateway {
    users: Arc<dyn UserRepository>,
    sessions: SessionManager,
}

impl AuthGateway {
    pub fn new(users: Arc<dyn UserRepository>, sessions: SessionManager) -> Self {
        Self { users, sessions }
    }

    pub fn users(&self) -> &Arc<dyn UserRepository> {
        &self.users
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Check credentials and issue a session
    pub async fn login(&self, form: &LoginForm, user_agent: &str) -> Result<Session, AuthError> {
        validate_login(form).map_err(AuthError::Validation)?;
        info!("Login attempt for user: {}", form.username);

        let user = self
            .users
            .authenticate(form.username.trim(), &form.password)
            .await
            .map_err(|e| {
                let err = AuthError::from(e);
                if !err.is_store_fault() {
                    info!("Login rejected for {}: {}", form.username, err);
                }
                err
            })?;

        self.issue_session(user.id, user.username, user_agent).await
    }

    /// Create a user and issue a session for them
    pub async fn register(
        &self,
        form: &RegistrationForm,
        user_agent: &str,
    ) -> Result<Session, AuthError> {
        let valid = validate_registration(form).map_err(AuthError::Validation)?;
        info!("Registering user: {}", valid.username);

        let password_hash = hash_password_blocking(valid.password).await?;
        let new_user = NewUser {
            username: valid.username,
            password_hash,
            first_name: valid.first_name,
            middle_name: valid.middle_name,
            last_name: valid.last_name,
            birthday: valid.birthday,
            telegram: valid.telegram,
        };

        let user = self.users.create(&new_user).await.map_err(|e| {
            let err = AuthError::from(e);
            if matches!(err, AuthError::AlreadyExists) {
                info!("Registration rejected, {} already exists", new_user.username);
            }
            err
        })?;

        self.issue_session(user.id, user.username, user_agent).await
    }

    /// Resolve the session behind an `Authorization` header value
    pub async fn authorize(&self, header: Option<&str>) -> Result<Session, AuthError> {
        let token = header
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                debug!("Missing or malformed Authorization header");
                AuthError::Unauthenticated
            })?;

        self.sessions
            .check(token)
            .await?
            .ok_or(AuthError::Unauthenticated)
    }

    /// Invalidate the given session
    pub async fn logout(&self, session: &Session) -> Result<(), AuthError> {
        self.sessions.invalidate(&session.token).await?;
        info!("User {} logged out", session.user_id);
        Ok(())
    }

    /// Bind a Telegram account id to the user registered with `handle`
    pub async fn bind_external_account(
        &self,
        account_id: i64,
        handle: &str,
    ) -> Result<(), AuthError> {
        self.users
            .bind_telegram_account(account_id, handle)
            .await
            .map_err(|e| {
                warn!("Cannot bind Telegram account {} to {}: {}", account_id, handle, e);
                AuthError::from(e)
            })
    }

    async fn issue_session(
        &self,
        user_id: i64,
        login: String,
        user_agent: &str,
    ) -> Result<Session, AuthError> {
        self.sessions
            .create(NewSession {
                user_id,
                login,
                user_agent: user_agent.to_string(),
            })
            .await
            .map_err(AuthError::SessionCreationFailed)
    }
}
