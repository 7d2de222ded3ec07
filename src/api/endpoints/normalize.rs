//! Symptom normalization endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::endpoints::assess::check_symptom_input;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::enums::Language;
use crate::triage::types::{RawSymptomInput, SymptomSet};

#[derive(Debug, Deserialize)]
pub struct NormalizeBody {
    pub symptoms: RawSymptomInput,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub language: Language,
    pub symptoms: SymptomSet,
}

/// `POST /api/normalize`: map raw input to canonical symptom tokens.
pub async fn normalize(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NormalizeBody>, JsonRejection>,
) -> Result<Json<NormalizeResponse>, ApiError> {
    let Json(body) = payload?;
    check_symptom_input(&body.symptoms)?;

    let language = body
        .language
        .as_deref()
        .map(Language::from_code)
        .unwrap_or_default();
    let symptoms = ctx.engine.normalize(&body.symptoms, language);

    Ok(Json(NormalizeResponse { language, symptoms }))
}
