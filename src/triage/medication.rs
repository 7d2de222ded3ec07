use std::collections::HashSet;

use crate::models::PatientContext;

use super::reference::{DrugInteraction, MedicationTable};
use super::types::{Contraindication, Medicine, MedicationSuggestion, SymptomSet};

/// Allergies shorter than this only match a medicine name exactly.
const MIN_ALLERGY_SUBSTRING: usize = 3;

/// Suggests over-the-counter medicines and home remedies, filtered against
/// the patient's allergies and current medications.
pub struct MedicationAdvisor {
    table: MedicationTable,
}

impl MedicationAdvisor {
    pub fn new(table: &MedicationTable) -> Self {
        Self {
            table: table.clone(),
        }
    }

    pub fn suggest(&self, symptoms: &SymptomSet, context: &PatientContext) -> MedicationSuggestion {
        let mut suggestion = MedicationSuggestion {
            warnings: self.warnings(context),
            ..Default::default()
        };

        let mut seen_medicines = HashSet::new();
        let mut seen_remedies = HashSet::new();

        for symptom in symptoms {
            for entry in self
                .table
                .entries
                .iter()
                .filter(|e| symptom == &e.key || symptom.contains(e.key.as_str()))
            {
                for medicine in &entry.safe_medicines {
                    if !seen_medicines.insert(medicine.name.to_lowercase()) {
                        continue;
                    }
                    match self.exclusion_reason(medicine, context) {
                        Some(reason) => suggestion.contraindications.push(Contraindication {
                            medicine: medicine.name.clone(),
                            reason,
                        }),
                        None => suggestion.safe_medicines.push(medicine.clone()),
                    }
                }
                for remedy in &entry.home_remedies {
                    if seen_remedies.insert(remedy.to_lowercase()) {
                        suggestion.home_remedies.push(remedy.clone());
                    }
                }
            }
        }

        if !suggestion.contraindications.is_empty() {
            tracing::debug!(
                excluded = suggestion.contraindications.len(),
                "Medicines excluded for allergy or interaction"
            );
        }
        suggestion
    }

    fn warnings(&self, context: &PatientContext) -> Vec<String> {
        let w = &self.table.warnings;
        let mut warnings = w.general.clone();
        if context.age < 12 {
            warnings.push(w.pediatric.clone());
        } else if context.age > 65 {
            warnings.push(w.elderly.clone());
        }
        if context.is_pregnant() {
            warnings.push(w.pregnancy.clone());
        }
        warnings
    }

    fn exclusion_reason(&self, medicine: &Medicine, context: &PatientContext) -> Option<String> {
        let name = medicine.name.to_lowercase();

        if let Some(allergy) = context
            .allergies
            .iter()
            .find(|a| allergy_matches(&name, a))
        {
            return Some(format!(
                "Avoid {} due to allergy ({allergy})",
                medicine.name
            ));
        }

        self.table
            .interactions
            .iter()
            .filter(|rule| name.contains(rule.medicine.as_str()))
            .find_map(|rule| interacting_drug(rule, context))
            .map(|drug| format!("Avoid {} due to interaction with {drug}", medicine.name))
    }
}

fn allergy_matches(medicine_name: &str, allergy: &str) -> bool {
    let allergy = allergy.trim().to_lowercase();
    if allergy.is_empty() {
        return false;
    }
    medicine_name == allergy
        || (allergy.chars().count() >= MIN_ALLERGY_SUBSTRING && medicine_name.contains(&allergy))
}

/// Current medication that triggers the rule, if the rule applies.
fn interacting_drug(rule: &DrugInteraction, context: &PatientContext) -> Option<String> {
    if let Some(condition) = &rule.requires_condition {
        if !context.chronic_conditions.contains(condition) {
            return None;
        }
    }
    context
        .current_medications
        .iter()
        .find(|current| rule.interacts_with.iter().any(|drug| current.contains(drug.as_str())))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Gender;
    use crate::triage::reference::TriageReferenceData;

    fn advisor() -> MedicationAdvisor {
        MedicationAdvisor::new(&TriageReferenceData::bundled().unwrap().medications)
    }

    fn set(items: &[&str]) -> SymptomSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn names(s: &MedicationSuggestion) -> Vec<&str> {
        s.safe_medicines.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn cold_symptoms_get_medicine_and_remedies() {
        let s = advisor().suggest(
            &set(&["runny_nose", "sore_throat"]),
            &PatientContext::new(28, Gender::Female),
        );
        assert!(names(&s).contains(&"Paracetamol"));
        assert!(!s.home_remedies.is_empty());
        assert!(s.contraindications.is_empty());
        assert_eq!(s.warnings.len(), 4);
    }

    #[test]
    fn paracetamol_allergy_is_excluded_with_reason() {
        let ctx = PatientContext::new(30, Gender::Male).with_allergies(["Paracetamol"]);
        let s = advisor().suggest(&set(&["fever", "headache"]), &ctx);
        assert!(!names(&s).contains(&"Paracetamol"));
        assert_eq!(s.contraindications.len(), 1);
        assert_eq!(s.contraindications[0].medicine, "Paracetamol");
        assert!(s.contraindications[0].reason.contains("allergy"));
        assert!(names(&s).contains(&"ORS"));
        assert!(names(&s).contains(&"Aspirin"));
    }

    #[test]
    fn aspirin_with_warfarin_is_contraindicated() {
        let ctx = PatientContext::default().with_medications(["Warfarin 5mg"]);
        let s = advisor().suggest(&set(&["headache"]), &ctx);
        assert_eq!(names(&s), vec!["Paracetamol"]);
        assert_eq!(s.contraindications[0].medicine, "Aspirin");
        assert!(s.contraindications[0].reason.contains("warfarin 5mg"));
    }

    #[test]
    fn paracetamol_warfarin_rule_needs_liver_disease() {
        let without = PatientContext::default().with_medications(["warfarin"]);
        let s = advisor().suggest(&set(&["fever"]), &without);
        assert!(names(&s).contains(&"Paracetamol"));

        let with = without.clone().with_chronic_conditions(["liver_disease"]);
        let s = advisor().suggest(&set(&["fever"]), &with);
        assert!(!names(&s).contains(&"Paracetamol"));
    }

    #[test]
    fn key_matches_as_substring_of_symptom() {
        let s = advisor().suggest(&set(&["high_fever"]), &PatientContext::default());
        assert!(names(&s).contains(&"ORS"));
    }

    #[test]
    fn medicines_are_deduplicated_across_entries() {
        let s = advisor().suggest(&set(&["fever", "headache", "common_cold"]), &PatientContext::default());
        let paracetamol = names(&s).iter().filter(|n| **n == "Paracetamol").count();
        assert_eq!(paracetamol, 1);
    }

    #[test]
    fn empty_symptoms_keep_warnings() {
        let s = advisor().suggest(&SymptomSet::new(), &PatientContext::default());
        assert!(s.safe_medicines.is_empty());
        assert!(s.home_remedies.is_empty());
        assert_eq!(s.warnings.len(), 4);
    }

    #[test]
    fn age_and_pregnancy_warnings() {
        let child = advisor().suggest(&set(&["fever"]), &PatientContext::new(8, Gender::Male));
        assert!(child.warnings.iter().any(|w| w.starts_with("Pediatric")));

        let elder = advisor().suggest(&set(&["fever"]), &PatientContext::new(70, Gender::Male));
        assert!(elder.warnings.iter().any(|w| w.starts_with("Elderly")));

        let pregnant = PatientContext::new(26, Gender::Female).with_chronic_conditions(["pregnancy"]);
        let s = advisor().suggest(&set(&["fever"]), &pregnant);
        assert!(s.warnings.iter().any(|w| w.starts_with("Pregnancy")));
    }

    #[test]
    fn short_allergy_only_matches_exactly() {
        assert!(!allergy_matches("ors", "or"));
        assert!(allergy_matches("ors", "ors"));
        assert!(allergy_matches("antihistamine (cetirizine)", "cetirizine"));
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptest_tests {
    use super::*;
    use crate::models::enums::Gender;
    use crate::triage::reference::TriageReferenceData;
    use proptest::prelude::*;

    fn medicine_names() -> Vec<String> {
        TriageReferenceData::bundled()
            .unwrap()
            .medications
            .entries
            .iter()
            .flat_map(|e| e.safe_medicines.iter().map(|m| m.name.clone()))
            .collect()
    }

    fn entry_keys() -> Vec<String> {
        TriageReferenceData::bundled()
            .unwrap()
            .medications
            .entries
            .iter()
            .map(|e| e.key.clone())
            .collect()
    }

    proptest! {
        /// No safe medicine ever matches an allergy, whatever the casing.
        #[test]
        fn allergies_never_reach_safe_list(
            symptom_picks in proptest::collection::vec(any::<prop::sample::Index>(), 0..6),
            allergy_picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..4),
            upper in any::<bool>(),
            age in 0u32..100,
        ) {
            let keys = entry_keys();
            let meds = medicine_names();
            let symptoms: SymptomSet = symptom_picks.iter().map(|i| i.get(&keys).clone()).collect();
            let allergies: Vec<String> = allergy_picks
                .iter()
                .map(|i| {
                    let name = i.get(&meds);
                    if upper { name.to_uppercase() } else { name.to_lowercase() }
                })
                .collect();
            let ctx = PatientContext::new(age, Gender::Unknown).with_allergies(allergies.clone());

            let advisor = MedicationAdvisor::new(&TriageReferenceData::bundled().unwrap().medications);
            let s = advisor.suggest(&symptoms, &ctx);

            for medicine in &s.safe_medicines {
                let lowered = medicine.name.to_lowercase();
                for allergy in &allergies {
                    prop_assert!(
                        !allergy_matches(&lowered, allergy),
                        "{} suggested despite allergy {}", medicine.name, allergy
                    );
                }
            }
        }
    }
}
