use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::subscriptions::{NewSubscription, Subscription, SubscriptionPatch, SubscriptionStatus};
use crate::web::PgPool;

#[derive(Clone)]
pub struct SubscriptionsRepository {
    pool: PgPool,
}

impl SubscriptionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a subscription by ID
    pub async fn get_by_id(&self, subscription_id: Uuid) -> Result<Option<Subscription>> {
        use crate::schema::subscriptions::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let subscription: Option<Subscription> = dsl::subscriptions
                .filter(dsl::id.eq(subscription_id))
                .first::<Subscription>(&mut conn)
                .optional()?;

            Ok::<Option<Subscription>, anyhow::Error>(subscription)
        })
        .await??;

        Ok(result)
    }

    /// Get a subscription by its provider-assigned ID
    pub async fn get_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>> {
        use crate::schema::subscriptions::dsl;

        let pool = self.pool.clone();
        let stripe_subscription_id = stripe_subscription_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let subscription: Option<Subscription> = dsl::subscriptions
                .filter(dsl::stripe_subscription_id.eq(&stripe_subscription_id))
                .first::<Subscription>(&mut conn)
                .optional()?;

            Ok::<Option<Subscription>, anyhow::Error>(subscription)
        })
        .await??;

        Ok(result)
    }

    /// Most recent `pending` subscription for a user. `subscription.created`
    /// is the only event keyed by user: the local record does not yet know
    /// the provider-assigned id.
    pub async fn find_pending_by_user(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        use crate::schema::subscriptions::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let subscription: Option<Subscription> = dsl::subscriptions
                .filter(dsl::user_id.eq(user_id))
                .filter(dsl::status.eq(SubscriptionStatus::Pending))
                .order_by(dsl::created_at.desc())
                .first::<Subscription>(&mut conn)
                .optional()?;

            Ok::<Option<Subscription>, anyhow::Error>(subscription)
        })
        .await??;

        Ok(result)
    }

    /// Create a pending subscription (checkout initiation and tests)
    pub async fn create(&self, new_subscription: NewSubscription) -> Result<Subscription> {
        use crate::schema::subscriptions::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Subscription = diesel::insert_into(dsl::subscriptions)
                .values(&new_subscription)
                .get_result(&mut conn)?;

            Ok::<Subscription, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    /// Overwrite the provider-owned fields and mirror the user projection in
    /// the same transaction, so readers of `users` never observe a
    /// subscription state the subscription row does not have.
    pub async fn apply_patch(
        &self,
        subscription_id: Uuid,
        patch: SubscriptionPatch,
    ) -> Result<Subscription> {
        use crate::schema::subscriptions::dsl;
        use crate::schema::users;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<Subscription, anyhow::Error, _>(|conn| {
                let updated: Subscription = diesel::update(dsl::subscriptions)
                    .filter(dsl::id.eq(subscription_id))
                    .set((
                        dsl::stripe_subscription_id.eq(patch.stripe_subscription_id.as_deref()),
                        dsl::stripe_customer_id.eq(patch.stripe_customer_id.as_deref()),
                        dsl::status.eq(patch.status),
                        dsl::amount_cents.eq(patch.amount_cents),
                        dsl::currency.eq(&patch.currency),
                        dsl::billing_interval.eq(patch.billing_interval),
                        dsl::interval_count.eq(patch.interval_count),
                        dsl::trial_start.eq(patch.trial_start),
                        dsl::trial_end.eq(patch.trial_end),
                        dsl::current_period_start.eq(patch.current_period_start),
                        dsl::current_period_end.eq(patch.current_period_end),
                        dsl::cancel_at_period_end.eq(patch.cancel_at_period_end),
                        dsl::updated_at.eq(diesel::dsl::now),
                    ))
                    .get_result(conn)?;

                diesel::update(users::table)
                    .filter(users::id.eq(updated.user_id))
                    .set((
                        users::subscription_status.eq(Some(updated.status)),
                        users::stripe_subscription_id
                            .eq(updated.stripe_subscription_id.as_deref()),
                        users::subscription_trial
                            .eq(updated.status == SubscriptionStatus::Trialing),
                        users::trial_end_date.eq(updated.trial_end),
                        users::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;

                Ok(updated)
            })
        })
        .await??;

        Ok(result)
    }

    /// Status-only transition (cancellation, payment failure), still mirrored
    /// onto the user projection in the same transaction.
    pub async fn update_status(
        &self,
        subscription_id: Uuid,
        status: SubscriptionStatus,
    ) -> Result<Subscription> {
        use crate::schema::subscriptions::dsl;
        use crate::schema::users;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<Subscription, anyhow::Error, _>(|conn| {
                let updated: Subscription = diesel::update(dsl::subscriptions)
                    .filter(dsl::id.eq(subscription_id))
                    .set((dsl::status.eq(status), dsl::updated_at.eq(diesel::dsl::now)))
                    .get_result(conn)?;

                diesel::update(users::table)
                    .filter(users::id.eq(updated.user_id))
                    .set((
                        users::subscription_status.eq(Some(updated.status)),
                        users::subscription_trial
                            .eq(updated.status == SubscriptionStatus::Trialing),
                        users::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;

                Ok(updated)
            })
        })
        .await??;

        Ok(result)
    }
}
