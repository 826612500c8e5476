//! Repositories for database operations

pub mod user;

pub use user::{PgUserRepository, UserRepository, require_any};
