//! Risk scoring: severity-weighted symptom sum, demographic multiplier and
//! combination bonus, reduced to a bounded 0–100 score and a risk level.
//!
//! Each scoring strategy is an independent `RiskSignalProvider`. The scorer
//! runs every configured provider and averages them; with the default
//! configuration only the rule-based signal runs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::enums::{Gender, RiskLevel};

use super::reference::{SymptomCombination, TriageReferenceData};
use super::types::{clamp_score, ContributingFactors, RiskAssessment, SymptomSet};

// ─── Thresholds ──────────────────────────────────────────────────────────────

/// Score boundaries for the three risk levels. Inclusive lower bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub red: u8,
    pub amber: u8,
}

impl RiskThresholds {
    pub const STANDARD: Self = Self { red: 80, amber: 50 };
    pub const STRICT: Self = Self { red: 70, amber: 40 };

    pub fn level_for(&self, score: u8) -> RiskLevel {
        if score >= self.red {
            RiskLevel::Red
        } else if score >= self.amber {
            RiskLevel::Amber
        } else {
            RiskLevel::Green
        }
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self::STANDARD
    }
}

// ─── Signals ─────────────────────────────────────────────────────────────────

/// Raw output of one scoring strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskSignal {
    /// Within 0.0..=100.0, not yet rounded.
    pub score: f64,
    pub confidence: f64,
    pub factors: ContributingFactors,
}

pub trait RiskSignalProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, symptoms: &SymptomSet, age: u32, gender: Gender) -> RiskSignal;
}

/// Strongest combination fully contained in `symptoms`.
fn strongest_combination<'a>(
    combinations: &'a [SymptomCombination],
    symptoms: &SymptomSet,
) -> Option<&'a SymptomCombination> {
    combinations
        .iter()
        .filter(|c| c.symptoms.iter().all(|s| symptoms.contains(s)))
        .fold(None, |best: Option<&SymptomCombination>, c| match best {
            Some(b) if b.bonus >= c.bonus => Some(b),
            _ => Some(c),
        })
}

/// Severity-sum scorer. The primary signal.
pub struct RuleBasedSignal {
    weights: HashMap<String, f64>,
    default_weight: f64,
    combinations: Vec<SymptomCombination>,
}

impl RuleBasedSignal {
    const CONFIDENCE: f64 = 0.8;
    const SEVERITY_SCALE: f64 = 50.0;
    const COMBINATION_SCALE: f64 = 20.0;

    pub fn new(reference: &TriageReferenceData) -> Self {
        Self {
            weights: reference
                .symptoms
                .symptoms
                .iter()
                .map(|s| (s.name.clone(), s.weight))
                .collect(),
            default_weight: reference.symptoms.default_weight,
            combinations: reference.combinations.clone(),
        }
    }

    pub fn weight_of(&self, symptom: &str) -> f64 {
        self.weights
            .get(symptom)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Gender is accepted but does not influence the score.
    pub fn age_multiplier(age: u32) -> f64 {
        if age < 5 || age > 65 {
            1.3
        } else if age > 45 {
            1.1
        } else {
            1.0
        }
    }
}

impl RiskSignalProvider for RuleBasedSignal {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn evaluate(&self, symptoms: &SymptomSet, age: u32, _gender: Gender) -> RiskSignal {
        let weight_sum: f64 = symptoms.iter().map(|s| self.weight_of(s)).sum();
        let base = (weight_sum * Self::SEVERITY_SCALE).min(100.0);
        let age_factor = Self::age_multiplier(age);

        let combo = strongest_combination(&self.combinations, symptoms);
        let combination_bonus = combo.map_or(0.0, |c| c.bonus * Self::COMBINATION_SCALE);

        let score = (base * age_factor + combination_bonus).clamp(0.0, 100.0);

        RiskSignal {
            score,
            confidence: Self::CONFIDENCE,
            factors: ContributingFactors {
                severity_score: base,
                age_factor,
                combination_bonus,
                matched_combination: combo.map(|c| c.name.clone()),
            },
        }
    }
}

/// Offline weighted model: severity tier average, age band, symptom count
/// and combination bonus blended with fixed weights.
pub struct WeightedOfflineSignal {
    tiers: HashMap<String, f64>,
    combinations: Vec<SymptomCombination>,
}

impl WeightedOfflineSignal {
    const CONFIDENCE: f64 = 0.75;
    const UNKNOWN_SEVERITY: f64 = 0.3;
    const EMPTY_SEVERITY: f64 = 0.2;

    pub fn new(reference: &TriageReferenceData) -> Self {
        Self {
            tiers: reference
                .symptoms
                .symptoms
                .iter()
                .map(|s| (s.name.clone(), Self::tier_for(s.weight)))
                .collect(),
            combinations: reference.combinations.clone(),
        }
    }

    /// Collapse a table weight into the model's four severity tiers.
    fn tier_for(weight: f64) -> f64 {
        if weight >= 0.9 {
            1.0
        } else if weight >= 0.6 {
            0.8
        } else if weight >= 0.3 {
            0.5
        } else {
            0.2
        }
    }

    fn age_band(age: u32) -> f64 {
        let band = match age {
            0..=1 => 1.5,
            2..=11 => 1.2,
            12..=64 => 1.0,
            65..=79 => 1.3,
            _ => 1.5,
        };
        band / 1.5
    }
}

impl RiskSignalProvider for WeightedOfflineSignal {
    fn name(&self) -> &'static str {
        "weighted_offline"
    }

    fn evaluate(&self, symptoms: &SymptomSet, age: u32, _gender: Gender) -> RiskSignal {
        let severity = if symptoms.is_empty() {
            Self::EMPTY_SEVERITY
        } else {
            let total: f64 = symptoms
                .iter()
                .map(|s| self.tiers.get(s).copied().unwrap_or(Self::UNKNOWN_SEVERITY))
                .sum();
            total / symptoms.len() as f64
        };
        let age_factor = Self::age_band(age);
        let count_factor = (symptoms.len() as f64 / 5.0).min(1.0);
        let combo = strongest_combination(&self.combinations, symptoms);
        let combo_factor = combo.map_or(0.0, |c| c.bonus);

        let score = ((severity * 0.4 + age_factor * 0.2 + count_factor * 0.2 + combo_factor * 0.2)
            * 100.0)
            .clamp(0.0, 100.0);

        RiskSignal {
            score,
            confidence: Self::CONFIDENCE,
            factors: ContributingFactors {
                severity_score: severity * 100.0,
                age_factor,
                combination_bonus: combo_factor * 20.0,
                matched_combination: combo.map(|c| c.name.clone()),
            },
        }
    }
}

// ─── Scorer ──────────────────────────────────────────────────────────────────

/// Runs the configured signals and reduces them to one `RiskAssessment`.
pub struct RiskScorer {
    signals: Vec<Box<dyn RiskSignalProvider>>,
    thresholds: RiskThresholds,
}

impl RiskScorer {
    /// Rule-based only.
    pub fn new(reference: &TriageReferenceData, thresholds: RiskThresholds) -> Self {
        Self::with_signals(vec![Box::new(RuleBasedSignal::new(reference))], thresholds)
    }

    /// Rule-based plus the offline weighted model.
    pub fn ensemble(reference: &TriageReferenceData, thresholds: RiskThresholds) -> Self {
        Self::with_signals(
            vec![
                Box::new(RuleBasedSignal::new(reference)),
                Box::new(WeightedOfflineSignal::new(reference)),
            ],
            thresholds,
        )
    }

    /// The first signal supplies the contributing factors.
    pub fn with_signals(
        signals: Vec<Box<dyn RiskSignalProvider>>,
        thresholds: RiskThresholds,
    ) -> Self {
        Self {
            signals,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> RiskThresholds {
        self.thresholds
    }

    pub fn method(&self) -> String {
        match self.signals.as_slice() {
            [single] => single.name().to_string(),
            many => format!(
                "ensemble({})",
                many.iter().map(|s| s.name()).collect::<Vec<_>>().join("+")
            ),
        }
    }

    pub fn score(&self, symptoms: &SymptomSet, age: u32, gender: Gender) -> RiskAssessment {
        let outputs: Vec<RiskSignal> = if symptoms.is_empty() {
            Vec::new()
        } else {
            self.signals
                .iter()
                .map(|s| s.evaluate(symptoms, age, gender))
                .collect()
        };

        let Some(primary) = outputs.first() else {
            return RiskAssessment {
                score: 0,
                level: self.thresholds.level_for(0),
                confidence: RuleBasedSignal::CONFIDENCE,
                contributing_factors: ContributingFactors {
                    severity_score: 0.0,
                    age_factor: RuleBasedSignal::age_multiplier(age),
                    combination_bonus: 0.0,
                    matched_combination: None,
                },
                method: self.method(),
            };
        };

        let n = outputs.len() as f64;
        let mean_score = outputs.iter().map(|o| o.score).sum::<f64>() / n;
        let mean_confidence = outputs.iter().map(|o| o.confidence).sum::<f64>() / n;
        let score = clamp_score(mean_score);

        RiskAssessment {
            score,
            level: self.thresholds.level_for(score),
            confidence: mean_confidence.clamp(0.0, 1.0),
            contributing_factors: primary.factors.clone(),
            method: self.method(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> TriageReferenceData {
        TriageReferenceData::bundled().unwrap()
    }

    fn scorer() -> RiskScorer {
        RiskScorer::new(&reference(), RiskThresholds::STANDARD)
    }

    fn set(items: &[&str]) -> SymptomSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_set_scores_zero_green() {
        let r = scorer().score(&SymptomSet::new(), 30, Gender::Unknown);
        assert_eq!(r.score, 0);
        assert_eq!(r.level, RiskLevel::Green);
    }

    #[test]
    fn standard_threshold_boundaries() {
        let t = RiskThresholds::STANDARD;
        assert_eq!(t.level_for(79), RiskLevel::Amber);
        assert_eq!(t.level_for(80), RiskLevel::Red);
        assert_eq!(t.level_for(49), RiskLevel::Green);
        assert_eq!(t.level_for(50), RiskLevel::Amber);
        assert_eq!(t.level_for(0), RiskLevel::Green);
        assert_eq!(t.level_for(100), RiskLevel::Red);
    }

    #[test]
    fn strict_threshold_boundaries() {
        let t = RiskThresholds::STRICT;
        assert_eq!(t.level_for(69), RiskLevel::Amber);
        assert_eq!(t.level_for(70), RiskLevel::Red);
        assert_eq!(t.level_for(39), RiskLevel::Green);
        assert_eq!(t.level_for(40), RiskLevel::Amber);
    }

    #[test]
    fn cardiac_presentation_clamps_to_red() {
        let r = scorer().score(
            &set(&["chest_pain", "difficulty_breathing", "sweating"]),
            55,
            Gender::Male,
        );
        assert_eq!(r.score, 100);
        assert_eq!(r.level, RiskLevel::Red);
        assert_eq!(
            r.contributing_factors.matched_combination.as_deref(),
            Some("respiratory_distress")
        );
        assert!((r.contributing_factors.age_factor - 1.1).abs() < 1e-9);
    }

    #[test]
    fn mild_cold_is_green() {
        let r = scorer().score(&set(&["runny_nose", "sore_throat"]), 28, Gender::Female);
        assert_eq!(r.score, 25);
        assert_eq!(r.level, RiskLevel::Green);
        assert!((r.confidence - 0.8).abs() < 1e-9);
        assert_eq!(r.method, "rule_based");
    }

    #[test]
    fn unknown_symptom_uses_default_weight() {
        let r = scorer().score(&set(&["purple_toes"]), 30, Gender::Unknown);
        assert_eq!(r.score, 5);
        assert_eq!(r.level, RiskLevel::Green);
    }

    #[test]
    fn age_multiplier_bands() {
        assert_eq!(RuleBasedSignal::age_multiplier(4), 1.3);
        assert_eq!(RuleBasedSignal::age_multiplier(5), 1.0);
        assert_eq!(RuleBasedSignal::age_multiplier(45), 1.0);
        assert_eq!(RuleBasedSignal::age_multiplier(46), 1.1);
        assert_eq!(RuleBasedSignal::age_multiplier(65), 1.1);
        assert_eq!(RuleBasedSignal::age_multiplier(66), 1.3);
    }

    #[test]
    fn only_strongest_combination_counts() {
        // respiratory_distress (0.8) and respiratory_infection (0.6) both match.
        let r = scorer().score(
            &set(&["fever", "cough", "difficulty_breathing", "chest_pain"]),
            30,
            Gender::Unknown,
        );
        assert_eq!(
            r.contributing_factors.matched_combination.as_deref(),
            Some("respiratory_distress")
        );
        assert!((r.contributing_factors.combination_bonus - 16.0).abs() < 1e-9);
    }

    #[test]
    fn gender_does_not_change_score() {
        let s = set(&["fever", "headache", "nausea"]);
        let sc = scorer();
        let male = sc.score(&s, 40, Gender::Male);
        let female = sc.score(&s, 40, Gender::Female);
        assert_eq!(male, female);
    }

    #[test]
    fn ensemble_averages_signals() {
        let reference = reference();
        let s = set(&["fever", "cough"]);
        let rule = RuleBasedSignal::new(&reference).evaluate(&s, 30, Gender::Unknown);
        let offline = WeightedOfflineSignal::new(&reference).evaluate(&s, 30, Gender::Unknown);

        let r = RiskScorer::ensemble(&reference, RiskThresholds::STANDARD)
            .score(&s, 30, Gender::Unknown);
        assert_eq!(r.score, clamp_score((rule.score + offline.score) / 2.0));
        assert!((r.confidence - 0.775).abs() < 1e-9);
        assert_eq!(r.method, "ensemble(rule_based+weighted_offline)");
    }

    #[test]
    fn ensemble_empty_set_still_zero() {
        let r = RiskScorer::ensemble(&reference(), RiskThresholds::STANDARD)
            .score(&SymptomSet::new(), 80, Gender::Unknown);
        assert_eq!(r.score, 0);
        assert_eq!(r.level, RiskLevel::Green);
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn vocabulary() -> Vec<String> {
        TriageReferenceData::bundled()
            .unwrap()
            .symptoms
            .symptoms
            .into_iter()
            .map(|s| s.name)
            .collect()
    }

    proptest! {
        /// Score stays within bounds and level agrees with thresholds.
        #[test]
        fn score_bounded_and_level_consistent(
            picks in proptest::collection::vec(any::<prop::sample::Index>(), 0..12),
            extra in proptest::collection::vec("[a-z_]{1,12}", 0..3),
            age in 0u32..120,
        ) {
            let vocab = vocabulary();
            let mut symptoms: SymptomSet = picks.iter().map(|i| i.get(&vocab).clone()).collect();
            symptoms.extend(extra);
            let scorer = RiskScorer::ensemble(
                &TriageReferenceData::bundled().unwrap(),
                RiskThresholds::STANDARD,
            );
            let r = scorer.score(&symptoms, age, Gender::Unknown);
            prop_assert!(r.score <= 100);
            prop_assert_eq!(r.level, RiskThresholds::STANDARD.level_for(r.score));
            prop_assert!((0.0..=1.0).contains(&r.confidence));
        }

        /// Adding chest pain never lowers the score.
        #[test]
        fn chest_pain_is_monotonic(
            picks in proptest::collection::vec(any::<prop::sample::Index>(), 0..8),
            age in 0u32..110,
        ) {
            let vocab = vocabulary();
            let symptoms: SymptomSet = picks.iter().map(|i| i.get(&vocab).clone()).collect();
            let mut with_chest = symptoms.clone();
            with_chest.insert("chest_pain".to_string());

            let scorer = RiskScorer::new(
                &TriageReferenceData::bundled().unwrap(),
                RiskThresholds::STANDARD,
            );
            let before = scorer.score(&symptoms, age, Gender::Unknown);
            let after = scorer.score(&with_chest, age, Gender::Unknown);
            prop_assert!(after.score >= before.score);
            prop_assert!(after.level >= before.level);
        }
    }
}
