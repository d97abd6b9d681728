use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::payments::EscrowStatus;
use crate::submissions::{NewProjectSubmission, ProjectSubmission, SubmissionStatus};
use crate::web::PgPool;

#[derive(Clone)]
pub struct SubmissionsRepository {
    pool: PgPool,
}

impl SubmissionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a submission by ID
    pub async fn get_by_id(&self, submission_id: Uuid) -> Result<Option<ProjectSubmission>> {
        use crate::schema::project_submissions::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let submission: Option<ProjectSubmission> = dsl::project_submissions
                .filter(dsl::id.eq(submission_id))
                .first::<ProjectSubmission>(&mut conn)
                .optional()?;

            Ok::<Option<ProjectSubmission>, anyhow::Error>(submission)
        })
        .await??;

        Ok(result)
    }

    /// Create a new submission
    pub async fn create(&self, new_submission: NewProjectSubmission) -> Result<ProjectSubmission> {
        use crate::schema::project_submissions::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: ProjectSubmission = diesel::insert_into(dsl::project_submissions)
                .values(&new_submission)
                .get_result(&mut conn)?;

            Ok::<ProjectSubmission, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    /// Approve a submission once its approval payment lands. One transaction
    /// covers the submission status, the payment status and the project
    /// counter. The `status = submitted` precondition makes the counter
    /// increment idempotent even when a duplicate delivery slips past the
    /// event-id gate: the second transaction updates zero submission rows and
    /// skips the increment.
    pub async fn approve_paid(
        &self,
        submission_id: Uuid,
        project_id: Uuid,
        checkout_session_id: Option<String>,
        payment_intent_id: Option<String>,
    ) -> Result<Option<ProjectSubmission>> {
        use crate::schema::payments;
        use crate::schema::project_submissions::dsl;
        use crate::schema::projects;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<Option<ProjectSubmission>, anyhow::Error, _>(|conn| {
                let submission: Option<ProjectSubmission> = dsl::project_submissions
                    .filter(dsl::id.eq(submission_id))
                    .for_update()
                    .first::<ProjectSubmission>(conn)
                    .optional()?;

                let Some(submission) = submission else {
                    return Ok(None);
                };

                if submission.status != SubmissionStatus::Submitted {
                    return Ok(Some(submission));
                }

                let updated: ProjectSubmission = diesel::update(dsl::project_submissions)
                    .filter(dsl::id.eq(submission_id))
                    .filter(dsl::status.eq(SubmissionStatus::Submitted))
                    .set((
                        dsl::status.eq(SubmissionStatus::Approved),
                        dsl::approved_at.eq(diesel::dsl::now),
                        dsl::updated_at.eq(diesel::dsl::now),
                    ))
                    .get_result(conn)?;

                // Atomic SQL increment, never read-modify-write
                diesel::update(projects::table)
                    .filter(projects::id.eq(project_id))
                    .set((
                        projects::approved_submissions
                            .eq(projects::approved_submissions + 1),
                        projects::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;

                diesel::update(payments::table)
                    .filter(payments::submission_id.eq(submission_id))
                    .filter(payments::status.eq(EscrowStatus::Pending))
                    .set((
                        payments::status.eq(EscrowStatus::Approved),
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
}
