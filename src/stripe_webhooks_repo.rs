use anyhow::Result;
use diesel::prelude::*;

use crate::stripe_webhooks::{NewStripeWebhookEvent, StripeWebhookEventModel};
use crate::web::PgPool;

#[derive(Clone)]
pub struct StripeWebhookEventsRepository {
    pool: PgPool,
}

impl StripeWebhookEventsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one audit entry for a processing attempt
    pub async fn record_attempt(
        &self,
        new_event: NewStripeWebhookEvent,
    ) -> Result<StripeWebhookEventModel> {
        use crate::schema::stripe_webhook_events::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: StripeWebhookEventModel =
                diesel::insert_into(dsl::stripe_webhook_events)
                    .values(&new_event)
                    .get_result(&mut conn)?;

            Ok::<StripeWebhookEventModel, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    /// All audit entries recorded for an event id, oldest first
    pub async fn get_by_event_id(
        &self,
        stripe_event_id: &str,
    ) -> Result<Vec<StripeWebhookEventModel>> {
        use crate::schema::stripe_webhook_events::dsl;

        let pool = self.pool.clone();
        let stripe_event_id = stripe_event_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let entries: Vec<StripeWebhookEventModel> = dsl::stripe_webhook_events
                .filter(dsl::stripe_event_id.eq(&stripe_event_id))
                .order_by(dsl::created_at.asc())
                .load::<StripeWebhookEventModel>(&mut conn)?;

            Ok::<Vec<StripeWebhookEventModel>, anyhow::Error>(entries)
        })
        .await??;

        Ok(result)
    }
}
