use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::enums::{DiseaseUrgency, Gender};
use crate::models::PatientContext;

use super::reference::{DiseasePatternDefinition, TriageReferenceData};
use super::types::{DiseasePrediction, SymptomSet, TriageError};

static AGE_COMPARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^age\s*([<>])\s*(\d{1,3})$").expect("valid regex"));
static AGE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^age_(\d{1,3})_(\d{1,3})$").expect("valid regex"));

const MAX_PREDICTIONS: usize = 5;
const SYMPTOM_WEIGHT: f64 = 0.7;
const RISK_FACTOR_WEIGHT: f64 = 0.3;
const NEAR_COMPLETE_RATIO: f64 = 0.8;
const NEAR_COMPLETE_BONUS: f64 = 0.1;

/// Typed predicate over a patient context, parsed from the textual factor
/// list at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskFactor {
    AgeAbove(u32),
    AgeBelow(u32),
    /// Inclusive.
    AgeBetween(u32, u32),
    Male,
    Female,
    Condition(String),
}

impl RiskFactor {
    pub fn parse(raw: &str) -> Result<Self, TriageError> {
        let factor = raw.trim().to_lowercase();
        if factor.is_empty() {
            return Err(TriageError::Configuration("empty risk factor".into()));
        }

        if let Some(caps) = AGE_COMPARE.captures(&factor) {
            let bound: u32 = caps[2]
                .parse()
                .map_err(|_| TriageError::Configuration(format!("bad age bound in {raw}")))?;
            return Ok(if &caps[1] == ">" {
                Self::AgeAbove(bound)
            } else {
                Self::AgeBelow(bound)
            });
        }

        if let Some(caps) = AGE_RANGE.captures(&factor) {
            let low: u32 = caps[1]
                .parse()
                .map_err(|_| TriageError::Configuration(format!("bad age range in {raw}")))?;
            let high: u32 = caps[2]
                .parse()
                .map_err(|_| TriageError::Configuration(format!("bad age range in {raw}")))?;
            if low > high {
                return Err(TriageError::Configuration(format!(
                    "inverted age range in {raw}"
                )));
            }
            return Ok(Self::AgeBetween(low, high));
        }

        if factor.starts_with("age") && (factor.contains('<') || factor.contains('>')) {
            return Err(TriageError::Configuration(format!(
                "unparseable age factor {raw}"
            )));
        }

        Ok(match factor.as_str() {
            "male" => Self::Male,
            "female" => Self::Female,
            _ => Self::Condition(factor),
        })
    }

    pub fn matches(&self, context: &PatientContext) -> bool {
        match self {
            Self::AgeAbove(n) => context.age > *n,
            Self::AgeBelow(n) => context.age < *n,
            Self::AgeBetween(low, high) => (*low..=*high).contains(&context.age),
            Self::Male => context.gender == Gender::Male,
            Self::Female => context.gender == Gender::Female,
            Self::Condition(c) => context.chronic_conditions.contains(c),
        }
    }
}

struct DiseasePattern {
    name: String,
    symptoms: BTreeSet<String>,
    /// (original label, parsed predicate)
    risk_factors: Vec<(String, RiskFactor)>,
    urgency: DiseaseUrgency,
    threshold: f64,
    description: String,
    advice: Vec<String>,
}

impl DiseasePattern {
    fn from_definition(def: &DiseasePatternDefinition) -> Result<Self, TriageError> {
        let risk_factors = def
            .risk_factors
            .iter()
            .map(|raw| RiskFactor::parse(raw).map(|f| (raw.clone(), f)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: def.name.clone(),
            symptoms: def.symptoms.iter().cloned().collect(),
            risk_factors,
            urgency: def.urgency,
            threshold: def.confidence_threshold,
            description: def.description.clone(),
            advice: def.advice.clone(),
        })
    }

    fn evaluate(&self, symptoms: &SymptomSet, context: &PatientContext) -> Option<DiseasePrediction> {
        let matching_symptoms: Vec<String> =
            self.symptoms.intersection(symptoms).cloned().collect();
        if matching_symptoms.is_empty() {
            return None;
        }
        let symptom_score = matching_symptoms.len() as f64 / self.symptoms.len() as f64;

        let matching_risk_factors: Vec<String> = self
            .risk_factors
            .iter()
            .filter(|(_, f)| f.matches(context))
            .map(|(label, _)| label.clone())
            .collect();
        let risk_factor_score = if self.risk_factors.is_empty() {
            0.0
        } else {
            matching_risk_factors.len() as f64 / self.risk_factors.len() as f64
        };

        let mut confidence = SYMPTOM_WEIGHT * symptom_score + RISK_FACTOR_WEIGHT * risk_factor_score;
        if symptom_score >= NEAR_COMPLETE_RATIO {
            confidence += NEAR_COMPLETE_BONUS;
        }
        let confidence = round3(confidence.min(1.0));

        if confidence < self.threshold {
            return None;
        }

        Some(DiseasePrediction {
            name: self.name.clone(),
            confidence,
            matching_symptoms,
            matching_risk_factors,
            urgency: self.urgency,
            description: self.description.clone(),
            advice: self.advice.clone(),
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Ranks known disease patterns against a symptom set.
pub struct DiseasePatternMatcher {
    patterns: Vec<DiseasePattern>,
}

impl DiseasePatternMatcher {
    /// Fails with a configuration error if any risk factor is malformed.
    pub fn new(reference: &TriageReferenceData) -> Result<Self, TriageError> {
        let patterns = reference
            .disease_patterns
            .iter()
            .map(DiseasePattern::from_definition)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// At most five predictions, highest confidence first. Ties keep table order.
    pub fn detect(&self, symptoms: &SymptomSet, context: &PatientContext) -> Vec<DiseasePrediction> {
        let mut predictions: Vec<DiseasePrediction> = self
            .patterns
            .iter()
            .filter_map(|p| p.evaluate(symptoms, context))
            .collect();

        predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        predictions.truncate(MAX_PREDICTIONS);
        predictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> DiseasePatternMatcher {
        DiseasePatternMatcher::new(&TriageReferenceData::bundled().unwrap()).unwrap()
    }

    fn set(items: &[&str]) -> SymptomSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_factor_forms() {
        assert_eq!(RiskFactor::parse("age>50").unwrap(), RiskFactor::AgeAbove(50));
        assert_eq!(RiskFactor::parse("age<5").unwrap(), RiskFactor::AgeBelow(5));
        assert_eq!(RiskFactor::parse("age_10_30").unwrap(), RiskFactor::AgeBetween(10, 30));
        assert_eq!(RiskFactor::parse("Male").unwrap(), RiskFactor::Male);
        assert_eq!(
            RiskFactor::parse("diabetes").unwrap(),
            RiskFactor::Condition("diabetes".into())
        );
    }

    #[test]
    fn malformed_age_factor_is_configuration_error() {
        assert!(matches!(
            RiskFactor::parse("age>fifty"),
            Err(TriageError::Configuration(_))
        ));
        assert!(matches!(
            RiskFactor::parse("age_30_10"),
            Err(TriageError::Configuration(_))
        ));
    }

    #[test]
    fn factor_matching_uses_context() {
        let ctx = PatientContext::new(55, Gender::Male).with_chronic_conditions(["Diabetes"]);
        assert!(RiskFactor::AgeAbove(50).matches(&ctx));
        assert!(!RiskFactor::AgeBelow(5).matches(&ctx));
        assert!(RiskFactor::Male.matches(&ctx));
        assert!(!RiskFactor::Female.matches(&ctx));
        assert!(RiskFactor::Condition("diabetes".into()).matches(&ctx));
    }

    #[test]
    fn myocardial_infarction_ranked_first_for_cardiac_case() {
        let ctx = PatientContext::new(55, Gender::Male);
        let predictions = matcher().detect(
            &set(&["chest_pain", "difficulty_breathing", "sweating", "nausea", "left_arm_pain"]),
            &ctx,
        );
        let top = &predictions[0];
        assert_eq!(top.name, "myocardial_infarction");
        // 0.7 * 1.0 + 0.3 * (2/5) + 0.1, capped at 1.0
        assert_eq!(top.confidence, 0.92);
        assert_eq!(top.urgency, DiseaseUrgency::Critical);
        assert_eq!(top.matching_risk_factors, vec!["age>50", "male"]);
    }

    #[test]
    fn below_threshold_patterns_are_dropped() {
        // 1/4 of common_cold symptoms: 0.175 < 0.6
        let predictions = matcher().detect(&set(&["sneezing"]), &PatientContext::default());
        assert!(predictions.iter().all(|p| p.name != "common_cold"));
    }

    #[test]
    fn full_common_cold_match_passes_threshold() {
        let predictions = matcher().detect(
            &set(&["runny_nose", "sore_throat", "mild_cough", "sneezing"]),
            &PatientContext::default(),
        );
        let cold = predictions.iter().find(|p| p.name == "common_cold").unwrap();
        assert_eq!(cold.confidence, 0.8);
        assert!(!cold.advice.is_empty());
    }

    #[test]
    fn unknown_symptoms_are_ignored() {
        let m = matcher();
        let ctx = PatientContext::default();
        let base = m.detect(&set(&["runny_nose", "sore_throat", "mild_cough", "sneezing"]), &ctx);
        let noisy = m.detect(
            &set(&["runny_nose", "sore_throat", "mild_cough", "sneezing", "purple_toes"]),
            &ctx,
        );
        assert_eq!(base, noisy);
    }

    #[test]
    fn at_most_five_sorted_descending() {
        let predictions = matcher().detect(
            &set(&[
                "fever", "cough", "chest_pain", "difficulty_breathing", "fatigue",
                "chills", "headache", "muscle_aches", "loss_of_taste", "sweating",
                "nausea", "left_arm_pain", "vomiting", "abdominal_pain", "diarrhea",
                "abdominal_cramps", "wheezing", "chest_tightness",
            ]),
            &PatientContext::new(70, Gender::Male).with_chronic_conditions(["diabetes", "hypertension"]),
        );
        assert!(predictions.len() <= 5);
        assert!(predictions
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn empty_input_yields_no_predictions() {
        assert!(matcher()
            .detect(&SymptomSet::new(), &PatientContext::default())
            .is_empty());
    }
}
