//! Assessment endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::enums::{Gender, Language};
use crate::models::PatientContext;
use crate::triage::types::{AssessmentRequest, AssessmentResult, RawSymptomInput};

const MAX_AGE: u32 = 130;
const MAX_SYMPTOM_TOKENS: usize = 64;
const MAX_TEXT_LEN: usize = 4096;

/// Patient details supplied with a request. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct PatientBody {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, alias = "chronicConditions")]
    pub chronic_conditions: Vec<String>,
    #[serde(default, alias = "currentMedications")]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default, alias = "familyHistory")]
    pub family_history: Vec<String>,
}

impl PatientBody {
    pub fn into_context(self) -> Result<PatientContext, ApiError> {
        if self.age.is_some_and(|age| age > MAX_AGE) {
            return Err(ApiError::BadRequest(format!(
                "age must be between 0 and {MAX_AGE}"
            )));
        }
        let gender = self
            .gender
            .as_deref()
            .map(Gender::parse_lenient)
            .unwrap_or_default();

        let context = match self.age {
            Some(age) => PatientContext::new(age, gender),
            None => PatientContext::unknown_age(gender),
        };

        Ok(context
            .with_chronic_conditions(self.chronic_conditions)
            .with_medications(self.current_medications)
            .with_allergies(self.allergies)
            .with_family_history(self.family_history))
    }
}

#[derive(Debug, Deserialize)]
pub struct AssessBody {
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    pub symptoms: RawSymptomInput,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub patient: PatientBody,
}

pub(crate) fn check_symptom_input(input: &RawSymptomInput) -> Result<(), ApiError> {
    match input {
        RawSymptomInput::Text(text) if text.len() > MAX_TEXT_LEN => Err(ApiError::BadRequest(
            format!("symptom text longer than {MAX_TEXT_LEN} bytes"),
        )),
        RawSymptomInput::Tokens(tokens) if tokens.len() > MAX_SYMPTOM_TOKENS => Err(
            ApiError::BadRequest(format!("more than {MAX_SYMPTOM_TOKENS} symptoms")),
        ),
        _ => Ok(()),
    }
}

impl AssessBody {
    pub fn into_request(self) -> Result<AssessmentRequest, ApiError> {
        check_symptom_input(&self.symptoms)?;

        let user_id = match self.user_id.map(|id| id.trim().to_string()) {
            Some(id) if id.is_empty() => {
                return Err(ApiError::BadRequest("userId must not be empty".into()))
            }
            other => other,
        };

        Ok(AssessmentRequest {
            user_id,
            symptoms: self.symptoms,
            language: self
                .language
                .as_deref()
                .map(Language::from_code)
                .unwrap_or_default(),
            context: self.patient.into_context()?,
        })
    }
}

/// `POST /api/assess`: run a full triage assessment.
pub async fn assess(
    State(ctx): State<ApiContext>,
    payload: Result<Json<AssessBody>, JsonRejection>,
) -> Result<Json<AssessmentResult>, ApiError> {
    let Json(body) = payload?;
    let request = body.into_request()?;
    Ok(Json(ctx.engine.assess(request).await))
}
