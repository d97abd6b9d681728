use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::payments::EscrowStatus;
use crate::video_purchases::{NewVideoPurchase, VideoPurchase};
use crate::web::PgPool;

#[derive(Clone)]
pub struct VideoPurchasesRepository {
    pool: PgPool,
}

impl VideoPurchasesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a purchase by its payment ID
    pub async fn get_by_payment_id(&self, payment_id: Uuid) -> Result<Option<VideoPurchase>> {
        use crate::schema::video_purchases::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let purchase: Option<VideoPurchase> = dsl::video_purchases
                .filter(dsl::payment_id.eq(payment_id))
                .first::<VideoPurchase>(&mut conn)
                .optional()?;

            Ok::<Option<VideoPurchase>, anyhow::Error>(purchase)
        })
        .await??;

        Ok(result)
    }

    /// Create a new purchase
    pub async fn create(&self, new_purchase: NewVideoPurchase) -> Result<VideoPurchase> {
        use crate::schema::video_purchases::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: VideoPurchase = diesel::insert_into(dsl::video_purchases)
                .values(&new_purchase)
                .get_result(&mut conn)?;

            Ok::<VideoPurchase, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    /// Move the purchase and its payment row to `paid_to_platform` in one
    /// transaction. The purchase row is written by the browser-side checkout
    /// confirmation and may lag the webhook, so `Ok(None)` (no row yet) is the
    /// case the retry executor is expected to absorb. An already-paid purchase
    /// is a no-op returning the current row.
    pub async fn complete_purchase(
        &self,
        payment_id: Uuid,
        checkout_session_id: Option<String>,
        payment_intent_id: Option<String>,
    ) -> Result<Option<VideoPurchase>> {
        use crate::schema::payments;
        use crate::schema::video_purchases::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<Option<VideoPurchase>, anyhow::Error, _>(|conn| {
                let purchase: Option<VideoPurchase> = dsl::video_purchases
                    .filter(dsl::payment_id.eq(payment_id))
                    .for_update()
                    .first::<VideoPurchase>(conn)
                    .optional()?;

                let Some(purchase) = purchase else {
                    return Ok(None);
                };

                if !purchase
                    .status
                    .can_transition_to(EscrowStatus::PaidToPlatform)
                {
                    return Ok(Some(purchase));
                }

                let updated: VideoPurchase = diesel::update(dsl::video_purchases)
                    .filter(dsl::payment_id.eq(payment_id))
                    .set((
                        dsl::status.eq(EscrowStatus::PaidToPlatform),
                        dsl::paid_at.eq(diesel::dsl::now),
                        dsl::updated_at.eq(diesel::dsl::now),
                    ))
                    .get_result(conn)?;

                diesel::update(payments::table)
                    .filter(payments::id.eq(payment_id))
                    .filter(payments::status.eq(EscrowStatus::Pending))
                    .set((
                        payments::status.eq(EscrowStatus::PaidToPlatform),
                        payments::stripe_checkout_session_id.eq(checkout_session_id.as_deref()),
                        payments::stripe_payment_intent_id.eq(payment_intent_id.as_deref()),
                        payments::paid_at.eq(diesel::dsl::now),
                        payments::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;

                Ok(Some(updated))
            })
        })
        .await??;

        Ok(result)
    }

    /// Mark a still-pending purchase (and its payment) as expired.
    pub async fn mark_expired(&self, payment_id: Uuid) -> Result<Option<VideoPurchase>> {
        use crate::schema::payments;
        use crate::schema::video_purchases::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<Option<VideoPurchase>, anyhow::Error, _>(|conn| {
                let purchase: Option<VideoPurchase> = dsl::video_purchases
                    .filter(dsl::payment_id.eq(payment_id))
                    .for_update()
                    .first::<VideoPurchase>(conn)
                    .optional()?;

                let Some(purchase) = purchase else {
                    return Ok(None);
                };

                if purchase.status != EscrowStatus::Pending {
                    return Ok(Some(purchase));
                }

                let updated: VideoPurchase = diesel::update(dsl::video_purchases)
                    .filter(dsl::payment_id.eq(payment_id))
                    .set((
                        dsl::status.eq(EscrowStatus::CheckoutExpired),
                        dsl::expired_at.eq(diesel::dsl::now),
                        dsl::updated_at.eq(diesel::dsl::now),
                    ))
                    .get_result(conn)?;

                diesel::update(payments::table)
                    .filter(payments::id.eq(payment_id))
                    .filter(payments::status.eq(EscrowStatus::Pending))
                    .set((
                        payments::status.eq(EscrowStatus::CheckoutExpired),
                        payments::expired_at.eq(diesel::dsl::now),
                        payments::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;

                Ok(Some(updated))
            })
        })
        .await??;

        Ok(result)
    }
}
