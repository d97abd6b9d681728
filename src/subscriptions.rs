use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, TS)]
#[db_enum(existing_type_path = "crate::schema::sql_types::SubscriptionStatus")]
#[ts(export, export_to = "../web/src/lib/types/generated/")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[db_enum(rename = "pending")]
    Pending,
    #[db_enum(rename = "trialing")]
    Trialing,
    #[db_enum(rename = "active")]
    Active,
    #[db_enum(rename = "past_due")]
    PastDue,
    #[db_enum(rename = "unpaid")]
    Unpaid,
    #[db_enum(rename = "canceled")]
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, TS)]
#[db_enum(existing_type_path = "crate::schema::sql_types::BillingInterval")]
#[ts(export, export_to = "../web/src/lib/types/generated/")]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    #[db_enum(rename = "day")]
    Day,
    #[db_enum(rename = "week")]
    Week,
    #[db_enum(rename = "month")]
    Month,
    #[db_enum(rename = "year")]
    Year,
}

impl BillingInterval {
    pub fn as_str(self) -> &'static str {
        match self {
            BillingInterval::Day => "day",
            BillingInterval::Week => "week",
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

/// Diesel model for the subscriptions table. Created in `pending` by
/// checkout initiation; every later mutation of status and period fields
/// goes through the webhook pipeline or the verification read path.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub amount_cents: i32,
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub interval_count: i32,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SubscriptionStatus,
    pub amount_cents: i32,
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub interval_count: i32,
}

/// Full overwrite of the provider-owned subscription fields, applied in one
/// transaction together with the user-projection mirror. `None` trial/period
/// values clear the columns (the provider stopped reporting them).
#[derive(Debug, Clone)]
pub struct SubscriptionPatch {
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub amount_cents: i32,
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub interval_count: i32,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}
