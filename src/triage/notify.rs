use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::enums::{NotificationTier, RiskLevel, RoutingLevel, UrgencyLevel};

use super::types::SymptomSet;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Delivery failed on {channel}: {reason}")]
    Delivery { channel: String, reason: String },

    #[error("Internal lock failed")]
    LockFailed,
}

/// Everything a downstream channel needs to reach the patient or facility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub user_id: String,
    pub symptoms: SymptomSet,
    pub score: u8,
    pub level: RiskLevel,
    pub routing_level: RoutingLevel,
    pub urgency: UrgencyLevel,
    pub facility_ref: String,
    pub timestamp: DateTime<Utc>,
}

/// Critical and emergency routing share the critical fan-out.
pub fn tier_for(urgency: UrgencyLevel) -> NotificationTier {
    match urgency {
        UrgencyLevel::Critical | UrgencyLevel::Emergency => NotificationTier::Critical,
        UrgencyLevel::Urgent => NotificationTier::Urgent,
        UrgencyLevel::Routine => NotificationTier::Routine,
    }
}

/// Channels contacted for each tier, in dispatch order.
pub fn channel_plan(tier: NotificationTier) -> &'static [&'static str] {
    match tier {
        NotificationTier::Critical => &[
            "sms_patient_and_family",
            "ambulance_service",
            "chc_emergency_department",
            "district_medical_officer",
            "voice_call_emergency_contacts",
        ],
        NotificationTier::Urgent => &[
            "sms_patient",
            "phc_chc_notification",
            "asha_worker_alert",
            "whatsapp_family",
        ],
        NotificationTier::Routine => &[
            "app_notification",
            "asha_worker_notification",
            "health_record_update",
        ],
    }
}

/// Outbound notification sink. Failures are reported to the caller, which
/// logs them without failing the assessment.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(
        &self,
        tier: NotificationTier,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError>;
}

/// Emits the channel plan as structured log events. Stands in for real
/// SMS/voice gateways.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

impl NotificationDispatcher for TracingDispatcher {
    fn notify(
        &self,
        tier: NotificationTier,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        match tier {
            NotificationTier::Critical => tracing::warn!(
                user_id = %payload.user_id,
                score = payload.score,
                facility = %payload.facility_ref,
                "Critical notification"
            ),
            _ => tracing::info!(
                user_id = %payload.user_id,
                score = payload.score,
                tier = %tier,
                "Notification"
            ),
        }
        for channel in channel_plan(tier) {
            tracing::debug!(user_id = %payload.user_id, channel, "Dispatching");
        }
        Ok(())
    }
}

/// Keeps every dispatched notification in memory.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<(NotificationTier, NotificationPayload)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(NotificationTier, NotificationPayload)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(
        &self,
        tier: NotificationTier,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .map_err(|_| NotificationError::LockFailed)?
            .push((tier, payload.clone()));
        Ok(())
    }
}
