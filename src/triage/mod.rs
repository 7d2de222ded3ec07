//! Rule- and score-driven triage: symptom normalization, risk scoring,
//! disease pattern matching, history adjustment, care-level routing and
//! medication advice.

pub mod engine;
pub mod history;
pub mod medication;
pub mod messages;
pub mod normalizer;
pub mod notify;
pub mod patterns;
pub mod reference;
pub mod router;
pub mod scorer;
pub mod store;
pub mod types;

pub use engine::TriageEngine;
pub use notify::{NotificationDispatcher, TracingDispatcher};
pub use reference::TriageReferenceData;
pub use router::{FacilityRegistry, StaticFacilityRegistry};
pub use scorer::RiskThresholds;
pub use store::{HistoryStore, InMemoryHistoryStore};
pub use types::*;
