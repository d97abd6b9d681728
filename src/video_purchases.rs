use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payments::EscrowStatus;

/// Diesel model for the video_purchases table. Purchases are addressed by
/// `payment_id`: the checkout-creation flow writes the purchase row and the
/// payment row under the same payment id.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::video_purchases)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VideoPurchase {
    pub id: Uuid,
    pub video_id: Uuid,
    pub payment_id: Uuid,
    pub buyer_id: Uuid,
    pub creator_id: Uuid,
    pub amount_cents: i32,
    pub status: EscrowStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for new video purchases
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::video_purchases)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewVideoPurchase {
    pub id: Uuid,
    pub video_id: Uuid,
    pub payment_id: Uuid,
    pub buyer_id: Uuid,
    pub creator_id: Uuid,
    pub amount_cents: i32,
    pub status: EscrowStatus,
}
