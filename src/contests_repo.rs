use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::contests::{Contest, ContestDraft, ContestFinalization, NewContestDraft};
use crate::payments::EscrowStatus;
use crate::web::PgPool;

#[derive(Clone)]
pub struct ContestsRepository {
    pool: PgPool,
}

impl ContestsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a finalized contest by ID
    pub async fn get_by_id(&self, contest_id: Uuid) -> Result<Option<Contest>> {
        use crate::schema::contests::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let contest: Option<Contest> = dsl::contests
                .filter(dsl::id.eq(contest_id))
                .first::<Contest>(&mut conn)
                .optional()?;

            Ok::<Option<Contest>, anyhow::Error>(contest)
        })
        .await??;

        Ok(result)
    }

    /// Get a draft by ID
    pub async fn get_draft_by_id(&self, contest_id: Uuid) -> Result<Option<ContestDraft>> {
        use crate::schema::contest_drafts::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let draft: Option<ContestDraft> = dsl::contest_drafts
                .filter(dsl::id.eq(contest_id))
                .first::<ContestDraft>(&mut conn)
                .optional()?;

            Ok::<Option<ContestDraft>, anyhow::Error>(draft)
        })
        .await??;

        Ok(result)
    }

    /// Create a draft (checkout-creation flow and tests)
    pub async fn create_draft(&self, new_draft: NewContestDraft) -> Result<ContestDraft> {
        use crate::schema::contest_drafts::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: ContestDraft = diesel::insert_into(dsl::contest_drafts)
                .values(&new_draft)
                .get_result(&mut conn)?;

            Ok::<ContestDraft, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    /// Atomically replace the draft with a finalized contest and move the
    /// funding payment to `held_in_escrow`. One transaction covers the draft
    /// delete, the contest insert and the payment update, so a crash cannot
    /// leave both or neither record. A delivery that finds the draft gone but
    /// the contest present reports `AlreadyFinalized` (duplicate, success).
    pub async fn finalize_from_draft(
        &self,
        contest_id: Uuid,
        checkout_session_id: Option<String>,
        payment_intent_id: Option<String>,
    ) -> Result<ContestFinalization> {
        use crate::schema::contest_drafts;
        use crate::schema::contests;
        use crate::schema::payments;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<ContestFinalization, anyhow::Error, _>(|conn| {
                let draft: Option<ContestDraft> = contest_drafts::table
                    .filter(contest_drafts::id.eq(contest_id))
                    .for_update()
                    .first::<ContestDraft>(conn)
                    .optional()?;

                let Some(draft) = draft else {
                    let existing: Option<Contest> = contests::table
                        .filter(contests::id.eq(contest_id))
                        .first::<Contest>(conn)
                        .optional()?;
                    return Ok(match existing {
                        Some(contest) => ContestFinalization::AlreadyFinalized(contest),
                        None => ContestFinalization::NotFound,
                    });
                };

                let payment_id: Option<Uuid> = payments::table
                    .filter(payments::contest_id.eq(contest_id))
                    .select(payments::id)
                    .first::<Uuid>(conn)
                    .optional()?;

                let contest: Contest = diesel::insert_into(contests::table)
                    .values((
                        contests::id.eq(draft.id),
                        contests::brand_id.eq(draft.brand_id),
                        contests::title.eq(&draft.title),
                        contests::prize_amount_cents.eq(draft.prize_amount_cents),
                        contests::payment_id.eq(payment_id),
                        contests::funded_at.eq(diesel::dsl::now),
                    ))
                    .get_result(conn)?;

                diesel::delete(contest_drafts::table.filter(contest_drafts::id.eq(contest_id)))
                    .execute(conn)?;

                diesel::update(payments::table)
                    .filter(payments::contest_id.eq(contest_id))
                    .filter(payments::status.eq(EscrowStatus::Pending))
                    .set((
                        payments::status.eq(EscrowStatus::HeldInEscrow),
                        payments::stripe_checkout_session_id.eq(checkout_session_id.as_deref()),
                        payments::stripe_payment_intent_id.eq(payment_intent_id.as_deref()),
                        payments::paid_at.eq(diesel::dsl::now),
                        payments::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;

                Ok(ContestFinalization::Finalized(contest))
            })
        })
        .await??;

        Ok(result)
    }
}
