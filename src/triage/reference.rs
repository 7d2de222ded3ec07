use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::enums::{DiseaseUrgency, FacilityTier, Language};
use crate::models::HealthcareFacility;

use super::types::{Medicine, TriageError};

const SYMPTOMS_FILE: &str = "symptoms.json";
const LANGUAGES_FILE: &str = "languages.json";
const COMBINATIONS_FILE: &str = "combinations.json";
const DISEASE_PATTERNS_FILE: &str = "disease_patterns.json";
const MEDICATIONS_FILE: &str = "medications.json";
const ROUTING_RULES_FILE: &str = "routing_rules.json";
const ESCALATION_FILE: &str = "escalation.json";
const FACILITIES_FILE: &str = "facilities.json";

// ---------------------------------------------------------------------------
// Table shapes (loaded from resources/triage/*.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomDefinition {
    pub name: String,
    pub weight: f64,
    /// Free-text keywords in any script. Matched as lower-case substrings.
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomTable {
    /// Weight for tokens outside the vocabulary.
    pub default_weight: f64,
    pub symptoms: Vec<SymptomDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomCombination {
    pub name: String,
    pub symptoms: Vec<String>,
    pub bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseasePatternDefinition {
    pub name: String,
    pub symptoms: Vec<String>,
    pub risk_factors: Vec<String>,
    pub urgency: DiseaseUrgency,
    pub confidence_threshold: f64,
    pub description: String,
    #[serde(default)]
    pub advice: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationEntry {
    /// Matches a symptom equal to it or containing it.
    pub key: String,
    pub safe_medicines: Vec<Medicine>,
    pub home_remedies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugInteraction {
    pub medicine: String,
    pub interacts_with: Vec<String>,
    /// Rule only applies when the patient has this chronic condition.
    #[serde(default)]
    pub requires_condition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationWarnings {
    pub general: Vec<String>,
    pub pediatric: String,
    pub elderly: String,
    pub pregnancy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationTable {
    pub entries: Vec<MedicationEntry>,
    pub interactions: Vec<DrugInteraction>,
    pub warnings: MedicationWarnings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeOverride {
    pub infant_below: u32,
    pub elderly_above: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRules {
    pub emergency_symptoms: BTreeSet<String>,
    pub urgent_symptoms: BTreeSet<String>,
    pub semi_urgent_symptoms: BTreeSet<String>,
    /// Symptoms reported back as red flags.
    pub critical_symptoms: BTreeSet<String>,
    pub semi_urgent_min_score: u8,
    /// Keyed by facility tier name ("ASHA", "PHC", ...).
    pub base_wait_minutes: HashMap<String, u32>,
    pub age_override: AgeOverride,
    pub ambulance_number: String,
}

impl RoutingRules {
    pub fn base_wait(&self, tier: FacilityTier) -> u32 {
        self.base_wait_minutes
            .get(tier.as_str())
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeGroup {
    pub name: String,
    pub min_age: u32,
    pub max_age: u32,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringRule {
    /// Stored episodes required before the check runs.
    pub min_episodes: usize,
    /// Number of most recent episodes inspected.
    pub window: usize,
    pub min_shared_symptoms: usize,
    pub bonus: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationInteractionRule {
    pub symptom: String,
    /// Substrings looked for in current medications.
    pub medication_markers: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRules {
    pub chronic_multipliers: BTreeMap<String, f64>,
    pub age_groups: Vec<AgeGroup>,
    pub recurring: RecurringRule,
    pub interaction_bonus: u8,
    pub interaction_rules: Vec<MedicationInteractionRule>,
}

// ---------------------------------------------------------------------------
// TriageReferenceData
// ---------------------------------------------------------------------------

/// Every static rule table the triage pipeline reads. Loaded once, validated,
/// then shared read-only.
#[derive(Debug, Clone)]
pub struct TriageReferenceData {
    pub symptoms: SymptomTable,
    pub aliases: HashMap<Language, HashMap<String, String>>,
    pub combinations: Vec<SymptomCombination>,
    pub disease_patterns: Vec<DiseasePatternDefinition>,
    pub medications: MedicationTable,
    pub routing: RoutingRules,
    pub escalation: EscalationRules,
    pub facilities: Vec<HealthcareFacility>,
}

impl TriageReferenceData {
    /// Load reference data from a directory of JSON files.
    pub fn load(resources_dir: &Path) -> Result<Self, TriageError> {
        let data = Self {
            symptoms: read_json(resources_dir, SYMPTOMS_FILE)?,
            aliases: parse_aliases(read_json(resources_dir, LANGUAGES_FILE)?)?,
            combinations: read_json(resources_dir, COMBINATIONS_FILE)?,
            disease_patterns: read_json(resources_dir, DISEASE_PATTERNS_FILE)?,
            medications: read_json(resources_dir, MEDICATIONS_FILE)?,
            routing: read_json(resources_dir, ROUTING_RULES_FILE)?,
            escalation: read_json(resources_dir, ESCALATION_FILE)?,
            facilities: read_json(resources_dir, FACILITIES_FILE)?,
        };
        data.validate()?;
        tracing::info!(
            dir = %resources_dir.display(),
            symptoms = data.symptoms.symptoms.len(),
            patterns = data.disease_patterns.len(),
            facilities = data.facilities.len(),
            "Triage reference data loaded"
        );
        Ok(data)
    }

    /// Reference data compiled into the binary.
    pub fn bundled() -> Result<Self, TriageError> {
        let data = Self {
            symptoms: parse_json(
                SYMPTOMS_FILE,
                include_str!("../../resources/triage/symptoms.json"),
            )?,
            aliases: parse_aliases(parse_json(
                LANGUAGES_FILE,
                include_str!("../../resources/triage/languages.json"),
            )?)?,
            combinations: parse_json(
                COMBINATIONS_FILE,
                include_str!("../../resources/triage/combinations.json"),
            )?,
            disease_patterns: parse_json(
                DISEASE_PATTERNS_FILE,
                include_str!("../../resources/triage/disease_patterns.json"),
            )?,
            medications: parse_json(
                MEDICATIONS_FILE,
                include_str!("../../resources/triage/medications.json"),
            )?,
            routing: parse_json(
                ROUTING_RULES_FILE,
                include_str!("../../resources/triage/routing_rules.json"),
            )?,
            escalation: parse_json(
                ESCALATION_FILE,
                include_str!("../../resources/triage/escalation.json"),
            )?,
            facilities: parse_json(
                FACILITIES_FILE,
                include_str!("../../resources/triage/facilities.json"),
            )?,
        };
        data.validate()?;
        Ok(data)
    }

    /// Canonical symptom vocabulary.
    pub fn vocabulary(&self) -> BTreeSet<&str> {
        self.symptoms
            .symptoms
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Reject tables that would make scoring or routing ill-defined.
    pub fn validate(&self) -> Result<(), TriageError> {
        let vocabulary = self.vocabulary();

        if vocabulary.len() != self.symptoms.symptoms.len() {
            return Err(config_error("duplicate symptom names in symptom table"));
        }
        check_unit_range("default symptom weight", self.symptoms.default_weight)?;
        for symptom in &self.symptoms.symptoms {
            check_unit_range(&format!("weight of {}", symptom.name), symptom.weight)?;
            if symptom.name.trim().is_empty() || symptom.name != symptom.name.to_lowercase() {
                return Err(config_error(&format!(
                    "symptom name must be a lower-case token: {:?}",
                    symptom.name
                )));
            }
        }

        for combo in &self.combinations {
            check_unit_range(&format!("bonus of {}", combo.name), combo.bonus)?;
            if combo.symptoms.is_empty() {
                return Err(config_error(&format!("combination {} is empty", combo.name)));
            }
            check_known(&vocabulary, &combo.symptoms, &combo.name)?;
        }

        for pattern in &self.disease_patterns {
            if pattern.symptoms.is_empty() {
                return Err(config_error(&format!(
                    "disease pattern {} has no symptoms",
                    pattern.name
                )));
            }
            if !(pattern.confidence_threshold > 0.0 && pattern.confidence_threshold <= 1.0) {
                return Err(config_error(&format!(
                    "threshold of {} must be in (0, 1]",
                    pattern.name
                )));
            }
            check_known(&vocabulary, &pattern.symptoms, &pattern.name)?;
        }

        for (condition, factor) in &self.escalation.chronic_multipliers {
            if !factor.is_finite() || *factor < 1.0 {
                return Err(config_error(&format!(
                    "chronic multiplier for {condition} must be >= 1.0"
                )));
            }
        }
        for group in &self.escalation.age_groups {
            if group.min_age > group.max_age || !group.multiplier.is_finite() || group.multiplier < 1.0 {
                return Err(config_error(&format!("invalid age group {}", group.name)));
            }
        }
        if self.escalation.recurring.window == 0 {
            return Err(config_error("recurring window must be at least 1"));
        }

        for tier in [FacilityTier::Asha, FacilityTier::Phc, FacilityTier::Chc] {
            if !self.routing.base_wait_minutes.contains_key(tier.as_str()) {
                return Err(config_error(&format!("missing base wait for {tier}")));
            }
        }
        if self.routing.ambulance_number.trim().is_empty() {
            return Err(config_error("ambulance number must not be empty"));
        }
        if self.facilities.is_empty() {
            return Err(config_error("facility list must not be empty"));
        }

        Ok(())
    }

    /// Compact counts for health reporting.
    pub fn summary(&self) -> ReferenceSummary {
        ReferenceSummary {
            symptoms: self.symptoms.symptoms.len(),
            combinations: self.combinations.len(),
            disease_patterns: self.disease_patterns.len(),
            medication_entries: self.medications.entries.len(),
            facilities: self.facilities.len(),
            languages: self.aliases.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceSummary {
    pub symptoms: usize,
    pub combinations: usize,
    pub disease_patterns: usize,
    pub medication_entries: usize,
    pub facilities: usize,
    pub languages: usize,
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T, TriageError> {
    let path = dir.join(file);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| TriageError::ReferenceDataLoad(path.display().to_string(), e.to_string()))?;
    parse_json(file, &text)
}

fn parse_json<T: DeserializeOwned>(file: &str, text: &str) -> Result<T, TriageError> {
    serde_json::from_str(text).map_err(|e| TriageError::ReferenceDataParse(file.into(), e.to_string()))
}

fn parse_aliases(
    raw: HashMap<String, HashMap<String, String>>,
) -> Result<HashMap<Language, HashMap<String, String>>, TriageError> {
    raw.into_iter()
        .map(|(code, map)| {
            let language: Language = code.parse().map_err(|_| {
                TriageError::ReferenceDataParse(
                    LANGUAGES_FILE.into(),
                    format!("unsupported language code {code}"),
                )
            })?;
            let map = map
                .into_iter()
                .map(|(alias, canonical)| (alias.trim().to_lowercase(), canonical))
                .collect();
            Ok((language, map))
        })
        .collect()
}

fn config_error(message: &str) -> TriageError {
    TriageError::Configuration(message.to_string())
}

fn check_unit_range(what: &str, value: f64) -> Result<(), TriageError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(config_error(&format!("{what} must be within [0, 1], got {value}")))
    }
}

fn check_known(vocabulary: &BTreeSet<&str>, symptoms: &[String], owner: &str) -> Result<(), TriageError> {
    match symptoms.iter().find(|s| !vocabulary.contains(s.as_str())) {
        Some(unknown) => Err(config_error(&format!(
            "{owner} references unknown symptom {unknown}"
        ))),
        None => Ok(()),
    }
}
