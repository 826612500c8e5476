//! Application state shared across handlers

use std::sync::Arc;

use auth::AuthGateway;
use common::repositories::UserRepository;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: AuthGateway,
}

impl AppState {
    pub fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }

    pub fn users(&self) -> &Arc<dyn UserRepository> {
        self.gateway.users()
    }
}
