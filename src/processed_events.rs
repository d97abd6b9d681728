use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Diesel model for the processed_events idempotency ledger. A row exists
/// iff the event's effects were applied; rows are never mutated or deleted.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::processed_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProcessedEventRecord {
    pub stripe_event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::processed_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewProcessedEvent {
    pub stripe_event_id: String,
    pub event_type: String,
}
