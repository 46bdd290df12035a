use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::services::companion::SessionCoordinator;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Ready once storage answers
pub async fn readiness_check(State(coordinator): State<Arc<SessionCoordinator>>) -> StatusCode {
    match coordinator.repository().health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!("Readiness check failed: {:#}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
