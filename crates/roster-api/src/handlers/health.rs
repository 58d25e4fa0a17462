//! Health check handler
//!
//! Author: hephaex@gmail.com

use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;
use crate::messages::MessageKey;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// API version
    pub version: String,
    /// Seconds since startup
    pub uptime_secs: u64,
}

/// Liveness plus a store round trip
///
/// # Responses
/// - 200: service and database are reachable
/// - 503: the database did not answer in time
/// - 500: the database ping failed
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    state
        .repository
        .ping()
        .await
        .map_err(|e| AppError::storage("health check", e))?;

    Ok(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
    })
    .message(MessageKey::ServiceHealthy))
}
