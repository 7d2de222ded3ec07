use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::models::enums::{Language, RiskLevel};
use crate::models::{Episode, PatientContext, UserMedicalHistory};

use super::history::HistoryAdjuster;
use super::medication::MedicationAdvisor;
use super::messages::MessageTemplates;
use super::normalizer::SymptomNormalizer;
use super::notify::{tier_for, NotificationDispatcher, NotificationPayload};
use super::patterns::DiseasePatternMatcher;
use super::reference::{ReferenceSummary, TriageReferenceData};
use super::router::{FacilityRegistry, StaticFacilityRegistry, TriageRouter};
use super::scorer::RiskScorer;
use super::store::{HistoryStore, UserLocks};
use super::types::{
    AssessmentRequest, AssessmentResult, ContributingFactors, Evaluation, HistoryError,
    HistoryStatus, InputIssue, RawSymptomInput, RiskAssessment, SymptomSet, TriageError,
};

/// Score reported when no symptom could be recognized.
const INPUT_FALLBACK_SCORE: u8 = 30;
const INPUT_FALLBACK_CONFIDENCE: f64 = 0.5;
const INPUT_FALLBACK_METHOD: &str = "input_fallback";
const ANONYMOUS_USER: &str = "anonymous";

/// Orchestrates one assessment: normalize, score, match, adjust for
/// history, route, suggest medication, persist the episode and notify.
pub struct TriageEngine {
    summary: ReferenceSummary,
    normalizer: SymptomNormalizer,
    scorer: RiskScorer,
    matcher: DiseasePatternMatcher,
    adjuster: HistoryAdjuster,
    router: TriageRouter,
    advisor: MedicationAdvisor,
    store: Arc<dyn HistoryStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    locks: UserLocks,
    history_timeout: Duration,
    max_episodes: usize,
}

impl TriageEngine {
    /// Build from the configured reference directory, or the bundled tables.
    pub fn from_config(
        config: &EngineConfig,
        store: Arc<dyn HistoryStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self, TriageError> {
        let reference = match &config.resources_dir {
            Some(dir) => TriageReferenceData::load(dir)?,
            None => TriageReferenceData::bundled()?,
        };
        Self::new(&reference, config, store, dispatcher)
    }

    pub fn new(
        reference: &TriageReferenceData,
        config: &EngineConfig,
        store: Arc<dyn HistoryStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self, TriageError> {
        let registry = StaticFacilityRegistry::new(reference.facilities.clone())?;
        Self::with_registry(reference, config, store, dispatcher, Arc::new(registry))
    }

    pub fn with_registry(
        reference: &TriageReferenceData,
        config: &EngineConfig,
        store: Arc<dyn HistoryStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        registry: Arc<dyn FacilityRegistry>,
    ) -> Result<Self, TriageError> {
        reference.validate()?;
        if config.max_episodes == 0 {
            return Err(TriageError::Configuration(
                "max episodes must be at least 1".into(),
            ));
        }

        let thresholds = config.thresholds.thresholds();
        let scorer = if config.ensemble {
            RiskScorer::ensemble(reference, thresholds)
        } else {
            RiskScorer::new(reference, thresholds)
        };

        tracing::info!(
            method = %scorer.method(),
            red = thresholds.red,
            amber = thresholds.amber,
            history_timeout_ms = config.history_timeout.as_millis() as u64,
            "Triage engine ready"
        );

        Ok(Self {
            summary: reference.summary(),
            normalizer: SymptomNormalizer::new(reference),
            matcher: DiseasePatternMatcher::new(reference)?,
            adjuster: HistoryAdjuster::new(&reference.escalation, thresholds),
            router: TriageRouter::new(&reference.routing, thresholds, registry),
            advisor: MedicationAdvisor::new(&reference.medications),
            scorer,
            store,
            dispatcher,
            locks: UserLocks::new(),
            history_timeout: config.history_timeout,
            max_episodes: config.max_episodes,
        })
    }

    pub fn reference_summary(&self) -> ReferenceSummary {
        self.summary
    }

    pub fn scoring_method(&self) -> String {
        self.scorer.method()
    }

    pub fn normalize(&self, input: &RawSymptomInput, language: Language) -> SymptomSet {
        self.normalizer.normalize(input, language)
    }

    /// Stored history for a user, bounded by the history timeout.
    pub async fn history(&self, user_id: &str) -> Result<Option<UserMedicalHistory>, HistoryError> {
        let store = Arc::clone(&self.store);
        let id = user_id.to_string();
        let task = tokio::task::spawn_blocking(move || store.get(&id));
        match tokio::time::timeout(self.history_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(HistoryError::TaskFailed(e.to_string())),
            Err(_) => Err(HistoryError::Timeout(self.timeout_ms())),
        }
    }

    /// Pure decision pipeline. When a history is supplied its patient
    /// context is used and its adjustments apply; nothing is persisted.
    pub fn evaluate(
        &self,
        symptoms: &SymptomSet,
        context: &PatientContext,
        history: Option<&UserMedicalHistory>,
    ) -> Evaluation {
        let effective = history.map_or_else(|| context.clone(), UserMedicalHistory::context);

        let base = self.scorer.score(symptoms, effective.age, effective.gender);
        let disease_predictions = self.matcher.detect(symptoms, &effective);
        let history_adjustment = history.map(|h| self.adjuster.adjust(&base, h, symptoms));
        let history_factors = history.map(HistoryAdjuster::history_factors);
        let risk_assessment = history_adjustment
            .as_ref()
            .map_or(base, |adj| adj.assessment.clone());

        let routing_decision = self.router.route(&risk_assessment, symptoms, &effective);
        let medication_suggestion = self.advisor.suggest(symptoms, &effective);
        let follow_up = MessageTemplates::follow_up(risk_assessment.level);
        let recommendations = MessageTemplates::recommendations(
            risk_assessment.level,
            &disease_predictions,
            routing_decision.level,
            self.router.ambulance_number(),
        );

        Evaluation {
            risk_assessment,
            disease_predictions,
            routing_decision,
            medication_suggestion,
            history_adjustment,
            history_factors,
            follow_up,
            recommendations,
        }
    }

    /// Full assessment with history read, episode write and notification.
    /// History and notification failures degrade the result, never fail it.
    pub async fn assess(&self, request: AssessmentRequest) -> AssessmentResult {
        let timestamp = Utc::now();
        let symptoms = self.normalizer.normalize(&request.symptoms, request.language);

        if symptoms.is_empty() {
            tracing::info!(
                user_id = request.user_id.as_deref().unwrap_or(ANONYMOUS_USER),
                "No recognizable symptoms, returning input fallback"
            );
            return self.input_fallback(request, timestamp);
        }

        let Some(user_id) = request.user_id.clone() else {
            let evaluation = self.evaluate(&symptoms, &request.context, None);
            self.dispatch(ANONYMOUS_USER, &symptoms, &evaluation, timestamp);
            return finish(None, symptoms, evaluation, HistoryStatus::Stateless, timestamp);
        };

        let guard = match self.locks.acquire(&user_id).await {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "User lock unavailable");
                None
            }
        };

        let (record, status) = match guard {
            None => (None, HistoryStatus::Unavailable),
            Some(_) => match self.history(&user_id).await {
                Ok(Some(mut stored)) => {
                    stored.merge_context(&request.context);
                    (Some(stored), HistoryStatus::Loaded)
                }
                Ok(None) => (
                    Some(UserMedicalHistory::from_context(&user_id, &request.context)),
                    HistoryStatus::NewUser,
                ),
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        error = %e,
                        "History unavailable, continuing without it"
                    );
                    (None, HistoryStatus::Unavailable)
                }
            },
        };

        let evaluation = self.evaluate(&symptoms, &request.context, record.as_ref());

        if let (Some(mut record), Some(guard)) = (record, guard) {
            record.record_episode(
                Episode {
                    date: timestamp,
                    symptoms: symptoms.clone(),
                    score: evaluation.risk_assessment.score,
                    level: evaluation.risk_assessment.level,
                },
                self.max_episodes,
            );
            self.persist(record, guard).await;
        }

        self.dispatch(&user_id, &symptoms, &evaluation, timestamp);
        finish(Some(user_id), symptoms, evaluation, status, timestamp)
    }

    /// The write task owns the user lock, so it completes and releases the
    /// lock even if this future is dropped.
    async fn persist(&self, record: UserMedicalHistory, guard: OwnedMutexGuard<()>) {
        let store = Arc::clone(&self.store);
        let user_id = record.user_id.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            store.put(&record)
        });

        match tokio::time::timeout(self.history_timeout, task).await {
            Ok(Ok(Ok(()))) => {
                tracing::debug!(user_id = %user_id, "History saved");
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(user_id = %user_id, error = %e, "History write failed");
            }
            Ok(Err(e)) => {
                tracing::warn!(user_id = %user_id, error = %e, "History write task failed");
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %user_id,
                    timeout_ms = self.timeout_ms(),
                    "History write still running after timeout"
                );
            }
        }
    }

    fn dispatch(
        &self,
        user_id: &str,
        symptoms: &SymptomSet,
        evaluation: &Evaluation,
        timestamp: DateTime<Utc>,
    ) {
        let routing = &evaluation.routing_decision;
        let tier = tier_for(routing.urgency);
        let payload = NotificationPayload {
            user_id: user_id.to_string(),
            symptoms: symptoms.clone(),
            score: evaluation.risk_assessment.score,
            level: evaluation.risk_assessment.level,
            routing_level: routing.level,
            urgency: routing.urgency,
            facility_ref: routing.facility_ref.clone(),
            timestamp,
        };
        if let Err(e) = self.dispatcher.notify(tier, &payload) {
            tracing::warn!(user_id = %user_id, tier = %tier, error = %e, "Notification failed");
        }
    }

    fn input_fallback(&self, request: AssessmentRequest, timestamp: DateTime<Utc>) -> AssessmentResult {
        let symptoms = SymptomSet::new();
        let risk_assessment = RiskAssessment {
            score: INPUT_FALLBACK_SCORE,
            level: RiskLevel::Green,
            confidence: INPUT_FALLBACK_CONFIDENCE,
            contributing_factors: ContributingFactors {
                severity_score: 0.0,
                age_factor: 1.0,
                combination_bonus: 0.0,
                matched_combination: None,
            },
            method: INPUT_FALLBACK_METHOD.to_string(),
        };
        let routing_decision = self.router.route(&risk_assessment, &symptoms, &request.context);
        let evaluation = Evaluation {
            follow_up: MessageTemplates::follow_up(risk_assessment.level),
            medication_suggestion: self.advisor.suggest(&symptoms, &request.context),
            recommendations: MessageTemplates::unrecognized_input(),
            risk_assessment,
            disease_predictions: Vec::new(),
            routing_decision,
            history_adjustment: None,
            history_factors: None,
        };

        let mut result = finish(
            request.user_id,
            symptoms,
            evaluation,
            HistoryStatus::Stateless,
            timestamp,
        );
        result.input_issue = Some(InputIssue::NoRecognizedSymptoms);
        result
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.history_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

fn finish(
    user_id: Option<String>,
    symptoms: SymptomSet,
    evaluation: Evaluation,
    history_status: HistoryStatus,
    timestamp: DateTime<Utc>,
) -> AssessmentResult {
    tracing::info!(
        user_id = user_id.as_deref().unwrap_or(ANONYMOUS_USER),
        score = evaluation.risk_assessment.score,
        level = %evaluation.risk_assessment.level,
        routing = %evaluation.routing_decision.level,
        history = ?history_status,
        "Assessment complete"
    );
    AssessmentResult {
        assessment_id: Uuid::new_v4(),
        user_id,
        symptoms,
        evaluation,
        input_issue: None,
        history_status,
        timestamp,
    }
}
