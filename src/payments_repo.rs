use anyhow::Result;
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::payments::{EscrowStatus, NewPayment, Payment};
use crate::web::PgPool;

#[derive(Clone)]
pub struct PaymentsRepository {
    pool: PgPool,
}

impl PaymentsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a payment by ID
    pub async fn get_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>> {
        use crate::schema::payments::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let payment: Option<Payment> = dsl::payments
                .filter(dsl::id.eq(payment_id))
                .first::<Payment>(&mut conn)
                .optional()?;

            Ok::<Option<Payment>, anyhow::Error>(payment)
        })
        .await??;

        Ok(result)
    }

    /// Get a payment by Stripe payment intent ID
    pub async fn get_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Payment>> {
        use crate::schema::payments::dsl;

        let pool = self.pool.clone();
        let payment_intent_id = payment_intent_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let payment: Option<Payment> = dsl::payments
                .filter(dsl::stripe_payment_intent_id.eq(&payment_intent_id))
                .first::<Payment>(&mut conn)
                .optional()?;

            Ok::<Option<Payment>, anyhow::Error>(payment)
        })
        .await??;

        Ok(result)
    }

    /// Create a new payment (checkout-creation flow and tests)
    pub async fn create(&self, new_payment: NewPayment) -> Result<Payment> {
        use crate::schema::payments::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Payment = diesel::insert_into(dsl::payments)
                .values(&new_payment)
                .get_result(&mut conn)?;

            Ok::<Payment, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    /// Transition a payment, addressed by payment intent ID, to a new escrow
    /// status. The read and the write run in one transaction so the
    /// one-directional state machine holds under concurrent deliveries.
    /// Returns `Ok(None)` when no payment carries this intent id, and
    /// `Ok(Some)` with the (possibly unchanged) payment otherwise — an
    /// already-transitioned record is left alone, not an error.
    pub async fn transition_by_intent(
        &self,
        payment_intent_id: &str,
        next: EscrowStatus,
    ) -> Result<Option<Payment>> {
        use crate::schema::payments::dsl;

        let pool = self.pool.clone();
        let payment_intent_id = payment_intent_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<Option<Payment>, anyhow::Error, _>(|conn| {
                let payment: Option<Payment> = dsl::payments
                    .filter(dsl::stripe_payment_intent_id.eq(&payment_intent_id))
                    .for_update()
                    .first::<Payment>(conn)
                    .optional()?;

                let Some(payment) = payment else {
                    return Ok(None);
                };

                if !payment.status.can_transition_to(next) {
                    return Ok(Some(payment));
                }

                let now = Utc::now();
                let paid_at = matches!(next, EscrowStatus::PaidToPlatform).then_some(now);
                let failed_at = matches!(next, EscrowStatus::PaymentFailed).then_some(now);
                let expired_at = matches!(next, EscrowStatus::CheckoutExpired).then_some(now);

                let updated: Payment = diesel::update(dsl::payments)
                    .filter(dsl::id.eq(payment.id))
                    .set((
                        dsl::status.eq(next),
                        dsl::paid_at.eq(paid_at.or(payment.paid_at)),
                        dsl::failed_at.eq(failed_at.or(payment.failed_at)),
                        dsl::expired_at.eq(expired_at.or(payment.expired_at)),
                        dsl::updated_at.eq(diesel::dsl::now),
                    ))
                    .get_result(conn)?;

                Ok(Some(updated))
            })
        })
        .await??;

        Ok(result)
    }

    /// A lapsed checkout session for a contest that was never funded. The
    /// pending-status filter keeps this from clobbering a payment that did
    /// complete; zero matched rows is a valid outcome.
    pub async fn expire_pending_by_contest(&self, contest_id: Uuid) -> Result<usize> {
        use crate::schema::payments::dsl;

        let pool = self.pool.clone();
        let count = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let count = diesel::update(dsl::payments)
                .filter(dsl::contest_id.eq(contest_id))
                .filter(dsl::status.eq(EscrowStatus::Pending))
                .set((
                    dsl::status.eq(EscrowStatus::CheckoutExpired),
                    dsl::expired_at.eq(diesel::dsl::now),
                    dsl::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)?;

            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        Ok(count)
    }

    /// Expire a single still-pending payment by its id. Covers sessions
    /// whose variant record was never written, where nothing else would
    /// ever move the payment out of `pending`.
    pub async fn expire_pending_by_id(&self, payment_id: Uuid) -> Result<usize> {
        use crate::schema::payments::dsl;

        let pool = self.pool.clone();
        let count = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let count = diesel::update(dsl::payments)
                .filter(dsl::id.eq(payment_id))
                .filter(dsl::status.eq(EscrowStatus::Pending))
                .set((
                    dsl::status.eq(EscrowStatus::CheckoutExpired),
                    dsl::expired_at.eq(diesel::dsl::now),
                    dsl::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)?;

            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        Ok(count)
    }

    pub async fn expire_pending_by_submission(&self, submission_id: Uuid) -> Result<usize> {
        use crate::schema::payments::dsl;

        let pool = self.pool.clone();
        let count = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let count = diesel::update(dsl::payments)
                .filter(dsl::submission_id.eq(submission_id))
                .filter(dsl::status.eq(EscrowStatus::Pending))
                .set((
                    dsl::status.eq(EscrowStatus::CheckoutExpired),
                    dsl::expired_at.eq(diesel::dsl::now),
                    dsl::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)?;

            Ok::<usize, anyhow::Error>(count)
        })
        .await??;

        Ok(count)
    }
}
