use crate::models::enums::{RiskLevel, RoutingLevel, TriageCategory};

use super::types::{DiseasePrediction, FollowUpPlan};

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

/// Patient-facing text for routing, follow-up and recommendations.
/// Plain, direct wording a community health worker can read aloud.
pub struct MessageTemplates;

impl MessageTemplates {
    /// Instructions for a triage category, with an age-specific line.
    pub fn routing_instructions(category: TriageCategory, age: u32, ambulance: &str) -> Vec<String> {
        let mut lines = match category {
            TriageCategory::Emergency => vec![
                format!("Call {ambulance} immediately for ambulance"),
                "Do not delay - go to nearest hospital".to_string(),
                "Keep patient calm and comfortable".to_string(),
                "Monitor breathing and consciousness".to_string(),
            ],
            TriageCategory::Urgent => owned(&[
                "Visit PHC or CHC within 2 hours",
                "Arrange transportation",
                "Bring medical history if available",
                "Monitor symptoms closely",
            ]),
            TriageCategory::SemiUrgent => owned(&[
                "Contact ASHA worker for assessment",
                "Schedule PHC visit if symptoms persist",
                "Take prescribed medications",
                "Rest and maintain hydration",
            ]),
            TriageCategory::NonUrgent => owned(&[
                "Continue home care measures",
                "Monitor symptoms for changes",
                "Maintain good hygiene",
                "Seek care if symptoms worsen",
            ]),
        };

        if age <= 5 {
            lines.push("Keep child hydrated and comfortable".to_string());
        } else if age >= 65 {
            lines.push("Monitor for complications due to age".to_string());
        }
        lines
    }

    pub fn follow_up(level: RiskLevel) -> FollowUpPlan {
        let (timeline, next_check, monitoring, red_flags) = match level {
            RiskLevel::Red => (
                "Immediate follow-up required",
                "Within 24 hours",
                "Continuous monitoring needed",
                ["Worsening symptoms", "New symptoms", "No improvement"],
            ),
            RiskLevel::Amber => (
                "Follow-up in 2-3 days",
                "Within 72 hours",
                "Daily symptom monitoring",
                ["High fever", "Difficulty breathing", "Severe pain"],
            ),
            RiskLevel::Green => (
                "Follow-up in 1 week if no improvement",
                "Within 7 days",
                "Self-monitoring at home",
                ["Symptoms worsen", "New symptoms appear", "No improvement in 3 days"],
            ),
        };
        FollowUpPlan {
            timeline: timeline.to_string(),
            next_check: next_check.to_string(),
            monitoring: monitoring.to_string(),
            red_flags: owned(&red_flags),
        }
    }

    /// Level guidance, advice for the top disease hypothesis, then the care level.
    pub fn recommendations(
        level: RiskLevel,
        predictions: &[DiseasePrediction],
        routing_level: RoutingLevel,
        ambulance: &str,
    ) -> Vec<String> {
        let mut lines = match level {
            RiskLevel::Red => vec![
                "URGENT: Seek immediate medical attention".to_string(),
                format!("Call emergency services ({ambulance}) if symptoms worsen"),
                "Do not delay treatment".to_string(),
            ],
            RiskLevel::Amber => owned(&[
                "Important: Consult healthcare provider soon",
                "Monitor symptoms closely",
                "Follow medication suggestions carefully",
            ]),
            RiskLevel::Green => owned(&[
                "Monitor symptoms and follow home care advice",
                "Contact ASHA worker if symptoms persist",
                "Maintain good hygiene and rest",
            ]),
        };

        if let Some(top) = predictions.first() {
            lines.extend(top.advice.iter().cloned());
        }
        lines.push(format!("Recommended care level: {routing_level}"));
        lines
    }

    /// Shown when no symptom could be recognized.
    pub fn unrecognized_input() -> Vec<String> {
        owned(&[
            "We could not recognize the symptoms described",
            "Consult healthcare provider",
            "Monitor symptoms closely",
            "Seek medical attention if symptoms worsen",
        ])
    }
}
