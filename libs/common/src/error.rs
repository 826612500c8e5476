//! Custom error types for the common library
//!
//! This module defines application-specific error types that can be used
//! throughout the application.

use redis::RedisError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error type for key-value store operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store could not be reached
    #[error("Cache connection error: {0}")]
    Connection(#[source] RedisError),

    /// A command was rejected or failed mid-flight
    #[error("Cache command error: {0}")]
    Command(#[source] RedisError),

    /// A stored value could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store is unavailable for a reason not reported by the driver
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;

/// Error type for user repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The referenced user does not exist
    #[error("no user found")]
    NotFound,

    /// A listing that must not be empty matched nothing
    #[error("no users found")]
    NoneFound,

    /// A unique constraint was violated
    #[error("already exists")]
    AlreadyExists,

    /// The supplied password does not match the stored hash
    #[error("invalid password")]
    BadPassword,

    /// A user tried to subscribe to their own birthday
    #[error("cannot subscribe to yourself")]
    SelfSubscription,

    /// Password hashing or hash parsing failed
    #[error("password hashing error: {0}")]
    Hashing(String),

    /// The backing store failed
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl RepositoryError {
    /// Whether this error comes from the store rather than from the request
    pub fn is_store_fault(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Hashing(_))
    }
}

/// Type alias for Result with RepositoryError
pub type RepositoryResult<T> = Result<T, RepositoryError>;
