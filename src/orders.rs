use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payments::EscrowStatus;

/// Diesel model for the orders table
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Order {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub creator_id: Uuid,
    pub amount_cents: i32,
    pub status: EscrowStatus,
    pub payment_id: Option<Uuid>,
    pub held_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for new orders
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewOrder {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub creator_id: Uuid,
    pub amount_cents: i32,
    pub status: EscrowStatus,
    pub payment_id: Option<Uuid>,
}
