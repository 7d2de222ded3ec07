use std::sync::Arc;

use crate::models::enums::{
    FacilityTier, RiskLevel, RoutingLevel, Transport, TriageCategory, UrgencyLevel,
};
use crate::models::{HealthcareFacility, PatientContext};

use super::messages::MessageTemplates;
use super::reference::RoutingRules;
use super::scorer::RiskThresholds;
use super::types::{RiskAssessment, RoutingDecision, SymptomSet, TriageError};

const URGENT_MIN_WAIT_MINUTES: u32 = 5;
const VULNERABLE_WAIT_FACTOR: f64 = 0.8;

// ---------------------------------------------------------------------------
// Facility registry
// ---------------------------------------------------------------------------

/// Source of candidate facilities for routing.
pub trait FacilityRegistry: Send + Sync {
    fn list_by_tier(&self, tier: FacilityTier) -> Vec<HealthcareFacility>;
    fn all(&self) -> Vec<HealthcareFacility>;
}

/// Fixed facility list, usually from reference data.
pub struct StaticFacilityRegistry {
    facilities: Vec<HealthcareFacility>,
}

impl StaticFacilityRegistry {
    pub fn new(facilities: Vec<HealthcareFacility>) -> Result<Self, TriageError> {
        if facilities.is_empty() {
            return Err(TriageError::Configuration(
                "facility registry must contain at least one facility".into(),
            ));
        }
        Ok(Self { facilities })
    }
}

impl FacilityRegistry for StaticFacilityRegistry {
    fn list_by_tier(&self, tier: FacilityTier) -> Vec<HealthcareFacility> {
        self.facilities
            .iter()
            .filter(|f| f.tier == tier)
            .cloned()
            .collect()
    }

    fn all(&self) -> Vec<HealthcareFacility> {
        self.facilities.clone()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Maps a risk assessment and symptoms onto a care level, facility,
/// transport mode and wait estimate.
pub struct TriageRouter {
    rules: RoutingRules,
    thresholds: RiskThresholds,
    registry: Arc<dyn FacilityRegistry>,
}

impl TriageRouter {
    pub fn new(
        rules: &RoutingRules,
        thresholds: RiskThresholds,
        registry: Arc<dyn FacilityRegistry>,
    ) -> Self {
        Self {
            rules: rules.clone(),
            thresholds,
            registry,
        }
    }

    pub fn ambulance_number(&self) -> &str {
        &self.rules.ambulance_number
    }

    /// Category before any age override. Emergency symptoms win over score.
    pub fn categorize(&self, assessment: &RiskAssessment, symptoms: &SymptomSet) -> TriageCategory {
        let has_any = |set: &std::collections::BTreeSet<String>| symptoms.iter().any(|s| set.contains(s));

        if has_any(&self.rules.emergency_symptoms) || assessment.score >= self.thresholds.red {
            TriageCategory::Emergency
        } else if assessment.score >= self.thresholds.amber
            || assessment.level >= RiskLevel::Amber
            || has_any(&self.rules.urgent_symptoms)
        {
            TriageCategory::Urgent
        } else if assessment.score >= self.rules.semi_urgent_min_score
            || has_any(&self.rules.semi_urgent_symptoms)
        {
            TriageCategory::SemiUrgent
        } else {
            TriageCategory::NonUrgent
        }
    }

    fn age_override_applies(&self, age: u32) -> bool {
        let bounds = &self.rules.age_override;
        age < bounds.infant_below || age > bounds.elderly_above
    }

    pub fn route(
        &self,
        assessment: &RiskAssessment,
        symptoms: &SymptomSet,
        context: &PatientContext,
    ) -> RoutingDecision {
        let red_flags: Vec<String> = symptoms
            .iter()
            .filter(|s| self.rules.critical_symptoms.contains(*s))
            .cloned()
            .collect();
        let emergency_symptom = symptoms
            .iter()
            .any(|s| self.rules.emergency_symptoms.contains(s));

        let mut category = self.categorize(assessment, symptoms);
        let age_override_applied =
            category < TriageCategory::Urgent && self.age_override_applies(context.age);
        if age_override_applied {
            category = TriageCategory::Urgent;
        }

        let (level, tier, urgency, transport) = match category {
            TriageCategory::Emergency => (
                RoutingLevel::Emergency,
                FacilityTier::Chc,
                if emergency_symptom {
                    UrgencyLevel::Critical
                } else {
                    UrgencyLevel::Emergency
                },
                Transport::Ambulance,
            ),
            TriageCategory::Urgent if !red_flags.is_empty() => (
                RoutingLevel::Chc,
                FacilityTier::Chc,
                UrgencyLevel::Urgent,
                Transport::PrivateVehicle,
            ),
            TriageCategory::Urgent => (
                RoutingLevel::Phc,
                FacilityTier::Phc,
                UrgencyLevel::Urgent,
                Transport::PrivateVehicle,
            ),
            TriageCategory::SemiUrgent => (
                RoutingLevel::Asha,
                FacilityTier::Asha,
                UrgencyLevel::Routine,
                Transport::SelfTransport,
            ),
            TriageCategory::NonUrgent => (
                RoutingLevel::Asha,
                FacilityTier::Asha,
                UrgencyLevel::Routine,
                Transport::Walking,
            ),
        };

        let estimated_wait_minutes = self.wait_minutes(urgency, tier, context.age);
        let facility = self.select_facility(tier);

        let (facility_ref, facility_name, mut contact_numbers) = match &facility {
            Some(f) => (f.id.clone(), f.name.clone(), f.contact_numbers()),
            None => {
                tracing::warn!(tier = tier.as_str(), "No facility available, routing to ambulance line");
                (
                    format!("ambulance_{}", self.rules.ambulance_number),
                    "National Ambulance Service".to_string(),
                    Vec::new(),
                )
            }
        };
        if category == TriageCategory::Emergency || facility.is_none() {
            contact_numbers.retain(|n| n != &self.rules.ambulance_number);
            contact_numbers.insert(0, self.rules.ambulance_number.clone());
        }

        RoutingDecision {
            level,
            category,
            urgency,
            transport,
            estimated_wait_minutes,
            instructions: MessageTemplates::routing_instructions(
                category,
                context.age,
                &self.rules.ambulance_number,
            ),
            facility_ref,
            facility_name,
            contact_numbers,
            red_flags,
            age_override_applied,
        }
    }

    fn wait_minutes(&self, urgency: UrgencyLevel, tier: FacilityTier, age: u32) -> u32 {
        let base = self.rules.base_wait(tier);
        match urgency {
            UrgencyLevel::Critical | UrgencyLevel::Emergency => 0,
            UrgencyLevel::Urgent => (base / 2).max(URGENT_MIN_WAIT_MINUTES),
            UrgencyLevel::Routine => {
                if age < 5 || age > 65 {
                    (f64::from(base) * VULNERABLE_WAIT_FACTOR).floor() as u32
                } else {
                    base
                }
            }
        }
    }

    /// First facility of the tier, else any facility at all.
    fn select_facility(&self, tier: FacilityTier) -> Option<HealthcareFacility> {
        self.registry
            .list_by_tier(tier)
            .into_iter()
            .next()
            .or_else(|| self.registry.all().into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Gender;
    use crate::triage::reference::TriageReferenceData;
    use crate::triage::types::ContributingFactors;

    struct EmptyRegistry;

    impl FacilityRegistry for EmptyRegistry {
        fn list_by_tier(&self, _tier: FacilityTier) -> Vec<HealthcareFacility> {
            Vec::new()
        }
        fn all(&self) -> Vec<HealthcareFacility> {
            Vec::new()
        }
    }

    fn reference() -> TriageReferenceData {
        TriageReferenceData::bundled().unwrap()
    }

    fn router() -> TriageRouter {
        let reference = reference();
        let registry = StaticFacilityRegistry::new(reference.facilities.clone()).unwrap();
        TriageRouter::new(&reference.routing, RiskThresholds::STANDARD, Arc::new(registry))
    }

    fn make_assessment(score: u8) -> RiskAssessment {
        RiskAssessment {
            score,
            level: RiskThresholds::STANDARD.level_for(score),
            confidence: 0.8,
            contributing_factors: ContributingFactors {
                severity_score: f64::from(score),
                age_factor: 1.0,
                combination_bonus: 0.0,
                matched_combination: None,
            },
            method: "rule_based".into(),
        }
    }

    fn set(items: &[&str]) -> SymptomSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn adult() -> PatientContext {
        PatientContext::new(30, Gender::Female)
    }

    #[test]
    fn emergency_symptom_overrides_low_score() {
        let d = router().route(&make_assessment(10), &set(&["chest_pain"]), &adult());
        assert_eq!(d.level, RoutingLevel::Emergency);
        assert_eq!(d.category, TriageCategory::Emergency);
        assert_eq!(d.urgency, UrgencyLevel::Critical);
        assert_eq!(d.transport, Transport::Ambulance);
        assert_eq!(d.estimated_wait_minutes, 0);
        assert_eq!(d.contact_numbers[0], "108");
        assert_eq!(d.red_flags, vec!["chest_pain"]);
    }

    #[test]
    fn red_score_without_override_is_emergency_not_critical() {
        let d = router().route(&make_assessment(85), &set(&["high_fever", "seizure"]), &adult());
        assert_eq!(d.level, RoutingLevel::Emergency);
        assert_eq!(d.urgency, UrgencyLevel::Emergency);
        assert_eq!(d.facility_ref, "chc_001");
    }

    #[test]
    fn amber_routes_to_phc_with_halved_wait() {
        let d = router().route(&make_assessment(55), &set(&["fever", "headache"]), &adult());
        assert_eq!(d.category, TriageCategory::Urgent);
        assert_eq!(d.level, RoutingLevel::Phc);
        assert_eq!(d.transport, Transport::PrivateVehicle);
        assert_eq!(d.estimated_wait_minutes, 45);
        assert_eq!(d.facility_ref, "phc_001");
    }

    #[test]
    fn urgent_with_red_flag_goes_to_chc() {
        let d = router().route(&make_assessment(45), &set(&["severe_abdominal_pain"]), &adult());
        assert_eq!(d.category, TriageCategory::Urgent);
        assert_eq!(d.level, RoutingLevel::Chc);
        assert_eq!(d.estimated_wait_minutes, 60);
        assert_eq!(d.red_flags, vec!["severe_abdominal_pain"]);
    }

    #[test]
    fn semi_urgent_symptom_routes_to_asha_self_transport() {
        let d = router().route(&make_assessment(20), &set(&["diarrhea"]), &adult());
        assert_eq!(d.category, TriageCategory::SemiUrgent);
        assert_eq!(d.level, RoutingLevel::Asha);
        assert_eq!(d.transport, Transport::SelfTransport);
        assert_eq!(d.estimated_wait_minutes, 30);
    }

    #[test]
    fn mild_case_is_non_urgent_walking() {
        let d = router().route(&make_assessment(25), &set(&["runny_nose", "sore_throat"]), &adult());
        assert_eq!(d.category, TriageCategory::NonUrgent);
        assert_eq!(d.level, RoutingLevel::Asha);
        assert_eq!(d.urgency, UrgencyLevel::Routine);
        assert_eq!(d.transport, Transport::Walking);
        assert_eq!(d.facility_ref, "asha_001");
        assert!(!d.age_override_applied);
    }

    #[test]
    fn infant_is_lifted_to_at_least_urgent() {
        let ctx = PatientContext::new(1, Gender::Unknown);
        let d = router().route(&make_assessment(20), &set(&["runny_nose"]), &ctx);
        assert!(d.category >= TriageCategory::Urgent);
        assert!(d.age_override_applied);
        assert_eq!(d.level, RoutingLevel::Phc);
    }

    #[test]
    fn elderly_is_lifted_to_at_least_urgent() {
        let ctx = PatientContext::new(80, Gender::Male);
        let d = router().route(&make_assessment(20), &set(&["runny_nose"]), &ctx);
        assert!(d.category >= TriageCategory::Urgent);
        assert!(d.age_override_applied);
    }

    #[test]
    fn age_override_never_lowers() {
        let ctx = PatientContext::new(80, Gender::Male);
        let d = router().route(&make_assessment(90), &set(&["chest_pain"]), &ctx);
        assert_eq!(d.category, TriageCategory::Emergency);
        assert!(!d.age_override_applied);
    }

    #[test]
    fn routine_wait_shortened_for_young_children() {
        let ctx = PatientContext::new(3, Gender::Unknown);
        let d = router().route(&make_assessment(10), &set(&["sneezing"]), &ctx);
        assert_eq!(d.category, TriageCategory::NonUrgent);
        assert_eq!(d.estimated_wait_minutes, 24);
    }

    #[test]
    fn missing_tier_falls_back_to_any_facility() {
        let reference = reference();
        let only_chc: Vec<_> = reference
            .facilities
            .iter()
            .filter(|f| f.tier == FacilityTier::Chc)
            .cloned()
            .collect();
        let router = TriageRouter::new(
            &reference.routing,
            RiskThresholds::STANDARD,
            Arc::new(StaticFacilityRegistry::new(only_chc).unwrap()),
        );
        let d = router.route(&make_assessment(10), &set(&["sneezing"]), &adult());
        assert_eq!(d.level, RoutingLevel::Asha);
        assert_eq!(d.facility_ref, "chc_001");
    }

    #[test]
    fn empty_dynamic_registry_falls_back_to_ambulance_line() {
        let reference = reference();
        let router = TriageRouter::new(
            &reference.routing,
            RiskThresholds::STANDARD,
            Arc::new(EmptyRegistry),
        );
        let d = router.route(&make_assessment(10), &set(&["sneezing"]), &adult());
        assert_eq!(d.facility_ref, "ambulance_108");
        assert_eq!(d.contact_numbers, vec!["108"]);
    }

    #[test]
    fn static_registry_rejects_empty_list() {
        assert!(matches!(
            StaticFacilityRegistry::new(Vec::new()),
            Err(TriageError::Configuration(_))
        ));
    }
}
