//! Shared test utilities for the birthday reminder crates.
//!
//! - [`MemoryStore`] - in-memory [`KeyValueStore`] with TTL driven by tokio time
//! - [`MemoryUserRepository`] - in-memory [`UserRepository`] with a subscription graph
//! - [`new_user`] / [`date`] - fixture builders
//!
//! [`KeyValueStore`]: common::cache::KeyValueStore
//! [`UserRepository`]: common::repositories::UserRepository

mod memory_store;
pub use memory_store::MemoryStore;

mod memory_users;
pub use memory_users::MemoryUserRepository;

mod fixtures;
pub use fixtures::{date, new_user};
