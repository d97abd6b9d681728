use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, TS)]
#[db_enum(existing_type_path = "crate::schema::sql_types::SubmissionStatus")]
#[ts(export, export_to = "../web/src/lib/types/generated/")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[db_enum(rename = "submitted")]
    Submitted,
    #[db_enum(rename = "approved")]
    Approved,
    #[db_enum(rename = "rejected")]
    Rejected,
}

/// Diesel model for the project_submissions table
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::project_submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProjectSubmission {
    pub id: Uuid,
    pub project_id: Uuid,
    pub creator_id: Uuid,
    pub status: SubmissionStatus,
    pub payment_id: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::project_submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewProjectSubmission {
    pub id: Uuid,
    pub project_id: Uuid,
    pub creator_id: Uuid,
    pub status: SubmissionStatus,
    pub payment_id: Option<Uuid>,
}
