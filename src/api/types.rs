//! Shared types for the API layer.

use std::sync::Arc;
use std::time::Instant;

use crate::triage::TriageEngine;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub engine: Arc<TriageEngine>,
    pub started_at: Instant,
}

impl ApiContext {
    pub fn new(engine: Arc<TriageEngine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
