//! Authentication error taxonomy

use common::error::RepositoryError;
use thiserror::Error;

use crate::{session::SessionError, validation::FieldError};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,

    #[error("invalid password")]
    BadPassword,

    #[error("already exists")]
    AlreadyExists,

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// Credentials were fine but the session could not be stored
    #[error("cannot create session: {0}")]
    SessionCreationFailed(#[source] SessionError),

    /// Missing, malformed, unknown or expired session
    #[error("unauthenticated")]
    Unauthenticated,

    #[error(transparent)]
    SessionStore(#[from] SessionError),

    #[error("user store error: {0}")]
    UserStore(#[source] RepositoryError),
}

impl AuthError {
    /// Whether the failure is on the server side rather than in the request
    pub fn is_store_fault(&self) -> bool {
        matches!(
            self,
            Self::SessionCreationFailed(_) | Self::SessionStore(_) | Self::UserStore(_)
        )
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AuthError::UserNotFound,
            RepositoryError::BadPassword => AuthError::BadPassword,
            RepositoryError::AlreadyExists => AuthError::AlreadyExists,
            other => AuthError::UserStore(other),
        }
    }
}
