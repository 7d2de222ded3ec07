//! Stored history lookup.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::UserMedicalHistory;

/// `GET /api/history/:user_id`: the stored record, or 404.
pub async fn get_history(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<String>,
) -> Result<Json<UserMedicalHistory>, ApiError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user id must not be empty".into()));
    }

    ctx.engine
        .history(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No history for user {user_id}")))
}
