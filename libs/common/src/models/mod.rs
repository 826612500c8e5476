//! Domain models shared by the services

pub mod user;

// Re-export for convenience
pub use user::{NewUser, User, normalize_handle};
