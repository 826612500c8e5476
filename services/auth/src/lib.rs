//! Authentication for the birthday reminder service
//!
//! - [`session`] - opaque session tokens stored in a key-value store with TTL
//! - [`gateway`] - login, registration, bearer authorization, account binding
//! - [`validation`] - per-field form validation

pub mod error;
pub mod gateway;
pub mod session;
pub mod validation;

pub use error::AuthError;
pub use gateway::AuthGateway;
pub use session::{NewSession, Session, SessionConfig, SessionError, SessionManager};
pub use validation::{FieldError, LoginForm, RegistrationForm};
