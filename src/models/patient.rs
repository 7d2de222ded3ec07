use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Gender, RiskLevel};

/// Age assumed when the caller does not supply one.
pub const DEFAULT_AGE: u32 = 30;

/// Trim, lower-case and drop empty entries.
pub fn normalize_set<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Patient attributes for a single assessment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContext {
    pub age: u32,
    /// False when `age` is the default stand-in rather than caller data.
    #[serde(skip, default = "age_known")]
    pub age_supplied: bool,
    pub gender: Gender,
    pub chronic_conditions: BTreeSet<String>,
    pub current_medications: BTreeSet<String>,
    pub allergies: BTreeSet<String>,
    pub family_history: BTreeSet<String>,
}

fn age_known() -> bool {
    true
}

impl Default for PatientContext {
    fn default() -> Self {
        Self::unknown_age(Gender::Unknown)
    }
}

impl PatientContext {
    pub fn new(age: u32, gender: Gender) -> Self {
        Self {
            age,
            age_supplied: true,
            gender,
            chronic_conditions: BTreeSet::new(),
            current_medications: BTreeSet::new(),
            allergies: BTreeSet::new(),
            family_history: BTreeSet::new(),
        }
    }

    /// Context for a caller that gave no age. Uses `DEFAULT_AGE` until a
    /// stored record says otherwise.
    pub fn unknown_age(gender: Gender) -> Self {
        Self {
            age_supplied: false,
            ..Self::new(DEFAULT_AGE, gender)
        }
    }

    pub fn with_chronic_conditions<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.chronic_conditions = normalize_set(values);
        self
    }

    pub fn with_medications<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.current_medications = normalize_set(values);
        self
    }

    pub fn with_allergies<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allergies = normalize_set(values);
        self
    }

    pub fn with_family_history<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.family_history = normalize_set(values);
        self
    }

    pub fn is_pregnant(&self) -> bool {
        self.chronic_conditions.contains("pregnancy")
    }
}

/// One past assessment retained in a user's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub date: DateTime<Utc>,
    pub symptoms: BTreeSet<String>,
    pub score: u8,
    pub level: RiskLevel,
}

/// Long-lived per-user record owned by the history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMedicalHistory {
    pub user_id: String,
    pub age: u32,
    pub gender: Gender,
    pub chronic_conditions: BTreeSet<String>,
    pub allergies: BTreeSet<String>,
    pub current_medications: BTreeSet<String>,
    pub family_history: BTreeSet<String>,
    /// Oldest first.
    pub previous_episodes: Vec<Episode>,
    pub last_consultation: Option<DateTime<Utc>>,
}

impl UserMedicalHistory {
    /// Create a fresh record for an unseen user from request data.
    pub fn from_context(user_id: &str, context: &PatientContext) -> Self {
        Self {
            user_id: user_id.to_string(),
            age: context.age,
            gender: context.gender,
            chronic_conditions: context.chronic_conditions.clone(),
            allergies: context.allergies.clone(),
            current_medications: context.current_medications.clone(),
            family_history: context.family_history.clone(),
            previous_episodes: Vec::new(),
            last_consultation: None,
        }
    }

    /// Fold request data into the stored record. A supplied age and a known
    /// gender replace the stored ones; set fields become the union.
    pub fn merge_context(&mut self, context: &PatientContext) {
        if context.age_supplied {
            self.age = context.age;
        }
        if context.gender != Gender::Unknown {
            self.gender = context.gender;
        }
        self.chronic_conditions
            .extend(context.chronic_conditions.iter().cloned());
        self.allergies.extend(context.allergies.iter().cloned());
        self.current_medications
            .extend(context.current_medications.iter().cloned());
        self.family_history
            .extend(context.family_history.iter().cloned());
    }

    /// Patient context reflecting the full stored record.
    pub fn context(&self) -> PatientContext {
        PatientContext {
            age: self.age,
            age_supplied: true,
            gender: self.gender,
            chronic_conditions: self.chronic_conditions.clone(),
            current_medications: self.current_medications.clone(),
            allergies: self.allergies.clone(),
            family_history: self.family_history.clone(),
        }
    }

    /// Append an episode, evicting the oldest beyond `max_episodes`.
    pub fn record_episode(&mut self, episode: Episode, max_episodes: usize) {
        self.last_consultation = Some(episode.date);
        self.previous_episodes.push(episode);
        if self.previous_episodes.len() > max_episodes {
            let excess = self.previous_episodes.len() - max_episodes;
            self.previous_episodes.drain(..excess);
        }
    }

    /// Last `n` episodes, oldest first.
    pub fn recent_episodes(&self, n: usize) -> &[Episode] {
        let start = self.previous_episodes.len().saturating_sub(n);
        &self.previous_episodes[start..]
    }
}
