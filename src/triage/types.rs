use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{
    DiseaseUrgency, Language, RiskLevel, RoutingLevel, Transport, TriageCategory, UrgencyLevel,
};
use crate::models::PatientContext;

/// Canonical, lower-case symptom tokens. Ordered so every pass over the set
/// is deterministic.
pub type SymptomSet = BTreeSet<String>;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Symptoms as supplied by the caller: free text or a token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSymptomInput {
    Text(String),
    Tokens(Vec<String>),
}

impl RawSymptomInput {
    pub fn tokens<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Tokens(values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone)]
pub struct AssessmentRequest {
    /// `None` runs a stateless assessment: no history read or write.
    pub user_id: Option<String>,
    pub symptoms: RawSymptomInput,
    pub language: Language,
    pub context: PatientContext,
}

impl AssessmentRequest {
    pub fn anonymous(symptoms: RawSymptomInput, context: PatientContext) -> Self {
        Self {
            user_id: None,
            symptoms,
            language: Language::En,
            context,
        }
    }

    pub fn for_user(user_id: &str, symptoms: RawSymptomInput, context: PatientContext) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            symptoms,
            language: Language::En,
            context,
        }
    }
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactors {
    /// Base score after the severity sum, before the age multiplier.
    pub severity_score: f64,
    pub age_factor: f64,
    /// Points added by the strongest matched combination.
    pub combination_bonus: f64,
    pub matched_combination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Always within 0..=100.
    pub score: u8,
    pub level: RiskLevel,
    pub confidence: f64,
    pub contributing_factors: ContributingFactors,
    pub method: String,
}

// ---------------------------------------------------------------------------
// Disease hypotheses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseasePrediction {
    pub name: String,
    pub confidence: f64,
    pub matching_symptoms: Vec<String>,
    pub matching_risk_factors: Vec<String>,
    pub urgency: DiseaseUrgency,
    pub description: String,
    pub advice: Vec<String>,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub level: RoutingLevel,
    pub category: TriageCategory,
    pub urgency: UrgencyLevel,
    pub transport: Transport,
    pub estimated_wait_minutes: u32,
    pub instructions: Vec<String>,
    pub facility_ref: String,
    pub facility_name: String,
    pub contact_numbers: Vec<String>,
    pub red_flags: Vec<String>,
    pub age_override_applied: bool,
}

// ---------------------------------------------------------------------------
// Medication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contraindication {
    pub medicine: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationSuggestion {
    pub safe_medicines: Vec<Medicine>,
    pub home_remedies: Vec<String>,
    pub warnings: Vec<String>,
    pub contraindications: Vec<Contraindication>,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One multiplicative step applied by the history adjuster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub source: String,
    pub factor: f64,
    pub score_after: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryAdjustment {
    pub assessment: RiskAssessment,
    pub base_score: u8,
    pub escalations: Vec<Escalation>,
    pub recurring_pattern: bool,
    pub medication_interactions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFactors {
    /// "high_risk" under 5 or over 65, otherwise "normal".
    pub age_factor: String,
    pub chronic_conditions: Vec<String>,
    pub current_medications: usize,
    pub previous_episodes: usize,
    pub allergies: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpPlan {
    pub timeline: String,
    pub next_check: String,
    pub monitoring: String,
    pub red_flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Stateless,
    NewUser,
    Loaded,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputIssue {
    NoRecognizedSymptoms,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Output of the pure evaluation pipeline, before any side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub risk_assessment: RiskAssessment,
    pub disease_predictions: Vec<DiseasePrediction>,
    pub routing_decision: RoutingDecision,
    pub medication_suggestion: MedicationSuggestion,
    pub history_adjustment: Option<HistoryAdjustment>,
    pub history_factors: Option<HistoryFactors>,
    pub follow_up: FollowUpPlan,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub assessment_id: Uuid,
    pub user_id: Option<String>,
    pub symptoms: SymptomSet,
    #[serde(flatten)]
    pub evaluation: Evaluation,
    pub input_issue: Option<InputIssue>,
    pub history_status: HistoryStatus,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("History lookup timed out after {0} ms")]
    Timeout(u64),

    #[error("History task failed: {0}")]
    TaskFailed(String),

    #[error("Internal lock failed")]
    LockFailed,
}

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Reference data load failed ({0}): {1}")]
    ReferenceDataLoad(String, String),

    #[error("Reference data parse failed ({0}): {1}")]
    ReferenceDataParse(String, String),

    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Clamp to 0..=100 and round half away from zero.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u8
}

/// Apply a multiplier, flooring the result and capping at 100.
pub fn escalate_score(score: u8, factor: f64) -> u8 {
    (f64::from(score) * factor).floor().clamp(0.0, 100.0) as u8
}

/// Add points to a score, capping at 100.
pub fn bump_score(score: u8, points: u8) -> u8 {
    score.saturating_add(points).min(100)
}
