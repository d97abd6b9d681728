use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::notifications::{NewNotification, Notification};
use crate::web::PgPool;

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: PgPool,
}

impl NotificationsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a notification for a user
    pub async fn create(&self, new_notification: NewNotification) -> Result<Notification> {
        use crate::schema::notifications::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Notification = diesel::insert_into(dsl::notifications)
                .values(&new_notification)
                .get_result(&mut conn)?;

            Ok::<Notification, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    /// Notifications for a user, newest first
    pub async fn get_by_user_id(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        use crate::schema::notifications::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let notifications: Vec<Notification> = dsl::notifications
                .filter(dsl::user_id.eq(user_id))
                .order_by(dsl::created_at.desc())
                .load::<Notification>(&mut conn)?;

            Ok::<Vec<Notification>, anyhow::Error>(notifications)
        })
        .await??;

        Ok(result)
    }
}
