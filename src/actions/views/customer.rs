use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;

use crate::users::User;

/// View model for the subscribing customer (API response)
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../web/src/lib/types/generated/")]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub subscription_status: Option<String>,
    pub subscription_trial: bool,
    pub trial_end_date: Option<DateTime<Utc>>,
}

impl From<User> for CustomerView {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            display_name: user.display_name,
            subscription_status: user.subscription_status.map(|s| s.as_str().to_string()),
            subscription_trial: user.subscription_trial,
            trial_end_date: user.trial_end_date,
        }
    }
}
