use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::notifications_repo::NotificationsRepository;
use crate::web::PgPool;

/// Diesel model for the notifications table
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
}

/// Best-effort notification send. Runs after the business transaction has
/// committed and never propagates failure: a lost notification must not fail
/// or roll back event processing.
pub async fn send(pool: &PgPool, user_id: Uuid, title: &str, body: &str) {
    let repo = NotificationsRepository::new(pool.clone());
    if let Err(e) = repo
        .create(NewNotification {
            user_id,
            title: title.to_string(),
            body: body.to_string(),
        })
        .await
    {
        metrics::counter!("notifications.send_failed").increment(1);
        warn!(user_id = %user_id, error = %e, "Failed to send notification");
    }
}
