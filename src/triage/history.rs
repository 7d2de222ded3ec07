use crate::models::UserMedicalHistory;

use super::reference::EscalationRules;
use super::scorer::RiskThresholds;
use super::types::{
    bump_score, escalate_score, Escalation, HistoryAdjustment, HistoryFactors, RiskAssessment,
    SymptomSet,
};

/// Rescales a base assessment using what is known about the user.
/// Never mutates the base assessment or the history.
pub struct HistoryAdjuster {
    rules: EscalationRules,
    thresholds: RiskThresholds,
}

impl HistoryAdjuster {
    pub fn new(rules: &EscalationRules, thresholds: RiskThresholds) -> Self {
        Self {
            rules: rules.clone(),
            thresholds,
        }
    }

    pub fn adjust(
        &self,
        base: &RiskAssessment,
        history: &UserMedicalHistory,
        current: &SymptomSet,
    ) -> HistoryAdjustment {
        let mut score = base.score;
        let mut escalations = Vec::new();

        // Sorted condition order keeps the floored chain deterministic.
        for (condition, factor) in &self.rules.chronic_multipliers {
            if history.chronic_conditions.contains(condition) {
                score = escalate_score(score, *factor);
                escalations.push(Escalation {
                    source: format!("chronic:{condition}"),
                    factor: *factor,
                    score_after: score,
                });
            }
        }

        for group in &self.rules.age_groups {
            if (group.min_age..=group.max_age).contains(&history.age) {
                score = escalate_score(score, group.multiplier);
                escalations.push(Escalation {
                    source: format!("age:{}", group.name),
                    factor: group.multiplier,
                    score_after: score,
                });
            }
        }

        let recurring_pattern = self.is_recurring(history, current);
        if recurring_pattern {
            score = bump_score(score, self.rules.recurring.bonus);
        }

        let medication_interactions = self.medication_interactions(history, current);
        if !medication_interactions.is_empty() {
            score = bump_score(score, self.rules.interaction_bonus);
        }

        let mut assessment = base.clone();
        assessment.score = score;
        assessment.level = self.thresholds.level_for(score);

        tracing::debug!(
            user_id = %history.user_id,
            base_score = base.score,
            adjusted_score = score,
            recurring_pattern,
            interactions = medication_interactions.len(),
            "History adjustment applied"
        );

        HistoryAdjustment {
            assessment,
            base_score: base.score,
            escalations,
            recurring_pattern,
            medication_interactions,
        }
    }

    /// Enough stored episodes, and one of the most recent shares enough
    /// symptoms with the current presentation.
    pub fn is_recurring(&self, history: &UserMedicalHistory, current: &SymptomSet) -> bool {
        let rule = &self.rules.recurring;
        if history.previous_episodes.len() < rule.min_episodes {
            return false;
        }
        history
            .recent_episodes(rule.window)
            .iter()
            .any(|episode| episode.symptoms.intersection(current).count() >= rule.min_shared_symptoms)
    }

    pub fn medication_interactions(
        &self,
        history: &UserMedicalHistory,
        current: &SymptomSet,
    ) -> Vec<String> {
        self.rules
            .interaction_rules
            .iter()
            .filter(|rule| current.contains(&rule.symptom))
            .filter(|rule| {
                history.current_medications.iter().any(|med| {
                    rule.medication_markers
                        .iter()
                        .any(|marker| med.contains(marker.as_str()))
                })
            })
            .map(|rule| rule.description.clone())
            .collect()
    }

    pub fn history_factors(history: &UserMedicalHistory) -> HistoryFactors {
        let high_risk = history.age < 5 || history.age > 65;
        HistoryFactors {
            age_factor: if high_risk { "high_risk" } else { "normal" }.to_string(),
            chronic_conditions: history.chronic_conditions.iter().cloned().collect(),
            current_medications: history.current_medications.len(),
            previous_episodes: history.previous_episodes.len(),
            allergies: history.allergies.len(),
        }
    }
}
