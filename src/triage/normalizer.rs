use std::collections::HashMap;

use crate::models::enums::Language;

use super::reference::TriageReferenceData;
use super::types::{RawSymptomInput, SymptomSet};

/// Maps raw caller input onto canonical symptom tokens.
pub struct SymptomNormalizer {
    aliases: HashMap<Language, HashMap<String, String>>,
    /// (canonical symptom, lower-cased keywords), in table order.
    keywords: Vec<(String, Vec<String>)>,
}

impl SymptomNormalizer {
    pub fn new(reference: &TriageReferenceData) -> Self {
        let keywords = reference
            .symptoms
            .symptoms
            .iter()
            .map(|s| {
                let words = s.keywords.iter().map(|k| k.to_lowercase()).collect();
                (s.name.clone(), words)
            })
            .collect();

        Self {
            aliases: reference.aliases.clone(),
            keywords,
        }
    }

    pub fn normalize(&self, input: &RawSymptomInput, language: Language) -> SymptomSet {
        match input {
            RawSymptomInput::Tokens(tokens) => self.normalize_tokens(tokens, language),
            RawSymptomInput::Text(text) => self.extract_from_text(text),
        }
    }

    /// Alias lookup in the request language, then English. Unmapped tokens
    /// pass through.
    fn normalize_tokens(&self, tokens: &[String], language: Language) -> SymptomSet {
        tokens
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .map(|token| self.resolve_alias(&token, language).unwrap_or(token))
            .collect()
    }

    fn resolve_alias(&self, token: &str, language: Language) -> Option<String> {
        let lookup = |lang: Language| {
            self.aliases
                .get(&lang)
                .and_then(|map| map.get(token))
                .cloned()
        };
        lookup(language).or_else(|| {
            if language == Language::En {
                None
            } else {
                lookup(Language::En)
            }
        })
    }

    fn extract_from_text(&self, text: &str) -> SymptomSet {
        let lowered = text.to_lowercase();
        if lowered.trim().is_empty() {
            return SymptomSet::new();
        }

        self.keywords
            .iter()
            .filter(|(_, words)| words.iter().any(|w| lowered.contains(w.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
