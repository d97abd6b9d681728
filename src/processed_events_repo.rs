use anyhow::Result;
use diesel::prelude::*;

use crate::processed_events::NewProcessedEvent;
use crate::web::PgPool;

#[derive(Clone)]
pub struct ProcessedEventsRepository {
    pool: PgPool,
}

impl ProcessedEventsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check whether an event id has already been applied (idempotency gate)
    pub async fn is_processed(&self, stripe_event_id: &str) -> Result<bool> {
        use crate::schema::processed_events::dsl;

        let pool = self.pool.clone();
        let stripe_event_id = stripe_event_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let exists: bool = diesel::select(diesel::dsl::exists(
                dsl::processed_events.filter(dsl::stripe_event_id.eq(&stripe_event_id)),
            ))
            .get_result(&mut conn)?;

            Ok::<bool, anyhow::Error>(exists)
        })
        .await??;

        Ok(result)
    }

    /// Record an event as applied. Called only after the handler committed;
    /// `ON CONFLICT DO NOTHING` absorbs the check-then-act race between two
    /// concurrent deliveries of the same id.
    pub async fn mark_processed(&self, stripe_event_id: &str, event_type: &str) -> Result<()> {
        use crate::schema::processed_events::dsl;

        let pool = self.pool.clone();
        let new_record = NewProcessedEvent {
            stripe_event_id: stripe_event_id.to_string(),
            event_type: event_type.to_string(),
        };
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            diesel::insert_into(dsl::processed_events)
                .values(&new_record)
                .on_conflict(dsl::stripe_event_id)
                .do_nothing()
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
