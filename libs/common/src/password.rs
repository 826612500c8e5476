//! Password hashing with Argon2
//!
//! Hashing is deliberately slow; async callers should go through
//! [`hash_password_blocking`] and [`verify_password_blocking`], which move the
//! work onto the blocking thread pool.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};

use crate::error::{RepositoryError, RepositoryResult};

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> RepositoryResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| RepositoryError::Hashing(format!("Failed to hash password: {}", e)))?
        .to_string();

    Ok(hash)
}

/// Verify a password against a PHC-formatted hash
///
/// The comparison inside Argon2 runs in constant time.
pub fn verify_password(password: &str, hash: &str) -> RepositoryResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| RepositoryError::Hashing(format!("Failed to parse password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn hash_password_blocking(password: String) -> RepositoryResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| RepositoryError::Hashing(e.to_string()))?
}

pub async fn verify_password_blocking(password: String, hash: String) -> RepositoryResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| RepositoryError::Hashing(e.to_string()))?
}
