use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::subscriptions::Subscription;

use super::CustomerView;

/// View model for subscriptions (API response)
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../web/src/lib/types/generated/")]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub amount_cents: i32,
    pub currency: String,
    pub billing_interval: String,
    pub interval_count: i32,
    pub trial_end: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

impl From<Subscription> for SubscriptionView {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id.to_string(),
            user_id: sub.user_id.to_string(),
            status: sub.status.as_str().to_string(),
            amount_cents: sub.amount_cents,
            currency: sub.currency,
            billing_interval: sub.billing_interval.as_str().to_string(),
            interval_count: sub.interval_count,
            trial_end: sub.trial_end,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
        }
    }
}

/// Reconciled subscription together with the customer it belongs to
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../web/src/lib/types/generated/")]
#[serde(rename_all = "camelCase")]
pub struct VerifiedSubscriptionView {
    pub subscription: SubscriptionView,
    pub customer: CustomerView,
}

/// Request body for post-checkout subscription verification
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "../web/src/lib/types/generated/")]
#[serde(rename_all = "camelCase")]
pub struct VerifySubscriptionRequest {
    pub subscription_id: String,
    pub checkout_session_id: Option<String>,
}
