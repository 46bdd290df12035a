use std::sync::Arc;
use axum::extract::FromRef;

use crate::auth::JwtManager;
use crate::services::companion::SessionCoordinator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<SessionCoordinator> {
    fn from_ref(state: &AppState) -> Self {
        state.coordinator.clone()
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
