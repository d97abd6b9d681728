use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::orders::{NewOrder, Order};
use crate::payments::EscrowStatus;
use crate::web::PgPool;

#[derive(Clone)]
pub struct OrdersRepository {
    pool: PgPool,
}

impl OrdersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID
    pub async fn get_by_id(&self, order_id: Uuid) -> Result<Option<Order>> {
        use crate::schema::orders::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let order: Option<Order> = dsl::orders
                .filter(dsl::id.eq(order_id))
                .first::<Order>(&mut conn)
                .optional()?;

            Ok::<Option<Order>, anyhow::Error>(order)
        })
        .await??;

        Ok(result)
    }

    /// Create a new order
    pub async fn create(&self, new_order: NewOrder) -> Result<Order> {
        use crate::schema::orders::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Order = diesel::insert_into(dsl::orders)
                .values(&new_order)
                .get_result(&mut conn)?;

            Ok::<Order, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    /// Move an order and its payment to `held_in_escrow` in one transaction.
    /// A record that already left `pending` is returned unchanged (duplicate
    /// delivery). Returns `Ok(None)` when the order does not exist.
    pub async fn mark_held_in_escrow(
        &self,
        order_id: Uuid,
        checkout_session_id: Option<String>,
        payment_intent_id: Option<String>,
    ) -> Result<Option<Order>> {
        use crate::schema::orders::dsl;
        use crate::schema::payments;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<Option<Order>, anyhow::Error, _>(|conn| {
                let order: Option<Order> = dsl::orders
                    .filter(dsl::id.eq(order_id))
                    .for_update()
                    .first::<Order>(conn)
                    .optional()?;

                let Some(order) = order else {
                    return Ok(None);
                };

                if !order.status.can_transition_to(EscrowStatus::HeldInEscrow) {
                    return Ok(Some(order));
                }

                let updated: Order = diesel::update(dsl::orders)
                    .filter(dsl::id.eq(order_id))
                    .set((
                        dsl::status.eq(EscrowStatus::HeldInEscrow),
                        dsl::held_at.eq(diesel::dsl::now),
                        dsl::updated_at.eq(diesel::dsl::now),
                    ))
                    .get_result(conn)?;

                diesel::update(payments::table)
                    .filter(payments::order_id.eq(order_id))
                    .filter(payments::status.eq(EscrowStatus::Pending))
                    .set((
                        payments::status.eq(EscrowStatus::HeldInEscrow),
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

    /// Mark a still-pending order (and its payment) as expired. A no-op for
    /// orders that were paid before the session expired.
    pub async fn mark_expired(&self, order_id: Uuid) -> Result<Option<Order>> {
        use crate::schema::orders::dsl;
        use crate::schema::payments;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<Option<Order>, anyhow::Error, _>(|conn| {
                let order: Option<Order> = dsl::orders
                    .filter(dsl::id.eq(order_id))
                    .for_update()
                    .first::<Order>(conn)
                    .optional()?;

                let Some(order) = order else {
                    return Ok(None);
                };

                if order.status != EscrowStatus::Pending {
                    return Ok(Some(order));
                }

                let updated: Order = diesel::update(dsl::orders)
                    .filter(dsl::id.eq(order_id))
                    .set((
                        dsl::status.eq(EscrowStatus::CheckoutExpired),
                        dsl::expired_at.eq(diesel::dsl::now),
                        dsl::updated_at.eq(diesel::dsl::now),
                    ))
                    .get_result(conn)?;

                diesel::update(payments::table)
                    .filter(payments::order_id.eq(order_id))
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
