//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::triage::reference::ReferenceSummary;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub scoring_method: String,
    pub uptime_secs: u64,
    pub reference_data: ReferenceSummary,
}

/// `GET /api/health`: liveness plus loaded reference data counts.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok",
        service: crate::config::APP_NAME,
        version: crate::config::APP_VERSION,
        scoring_method: ctx.engine.scoring_method(),
        uptime_secs: ctx.uptime_secs(),
        reference_data: ctx.engine.reference_summary(),
    }))
}
