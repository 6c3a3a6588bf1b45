//! Health and statistics handlers.

use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::datetime::to_rfc3339;
use crate::web::dto::{HealthResponse, StatsResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::MainAccess;

/// GET /api/health - Liveness probe (no authentication).
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: to_rfc3339(&Utc::now()),
    })
}

/// GET /api/stats - Totals over the whole storage root.
pub async fn storage_stats(
    State(state): State<Arc<AppState>>,
    _: MainAccess,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.storage.global_stats().await?;
    Ok(Json(stats.into()))
}
