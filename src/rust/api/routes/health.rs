//! Health check endpoint

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::{ApiError, SharedState};
use crate::config::API_VERSION;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub model_classes: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// GET /health - readiness of the API and the model
pub async fn health_check(State(state): State<SharedState>) -> Result<Json<HealthResponse>, ApiError> {
    let predictor = state.predictor()?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: API_VERSION.to_string(),
        model_loaded: true,
        model_classes: predictor.num_classes(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    }))
}
