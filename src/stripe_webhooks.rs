use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit-log outcome for one processing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Processed,
    Failed,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Processed => "processed",
            AuditStatus::Failed => "failed",
        }
    }
}

/// Diesel model for the stripe_webhook_events audit log. Append-only, one
/// row per processing attempt; a failed-then-redelivered event accumulates
/// several rows under the same stripe_event_id.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::stripe_webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StripeWebhookEventModel {
    pub id: Uuid,
    pub stripe_event_id: String,
    pub event_type: String,
    pub status: String,
    pub processing_error: Option<String>,
    pub object_id: Option<String>,
    pub livemode: bool,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Insert model for audit entries
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::stripe_webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewStripeWebhookEvent {
    pub stripe_event_id: String,
    pub event_type: String,
    pub status: String,
    pub processing_error: Option<String>,
    pub object_id: Option<String>,
    pub livemode: bool,
    pub payload: serde_json::Value,
}
