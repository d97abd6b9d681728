use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Diesel model for contest_drafts. A draft is written at checkout creation
/// and replaced by a finalized contest when the funding payment lands.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::contest_drafts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContestDraft {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub title: String,
    pub prize_amount_cents: i32,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::contest_drafts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewContestDraft {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub title: String,
    pub prize_amount_cents: i32,
    pub data: serde_json::Value,
}

/// Diesel model for finalized contests (same id as the draft it replaced)
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::contests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Contest {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub title: String,
    pub prize_amount_cents: i32,
    pub payment_id: Option<Uuid>,
    pub funded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of the draft → contest replace
#[derive(Debug, Clone)]
pub enum ContestFinalization {
    /// Draft consumed, finalized contest created
    Finalized(Contest),
    /// Draft already gone and the finalized contest exists: duplicate
    /// delivery, treated as success
    AlreadyFinalized(Contest),
    /// Neither draft nor contest exists for this id
    NotFound,
}
