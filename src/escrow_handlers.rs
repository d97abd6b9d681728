use tracing::{info, warn};

use crate::contests::ContestFinalization;
use crate::contests_repo::ContestsRepository;
use crate::escrow::{EscrowPurpose, ProcessError};
use crate::notifications;
use crate::orders_repo::OrdersRepository;
use crate::payments::EscrowStatus;
use crate::payments_repo::PaymentsRepository;
use crate::retry::RetryPolicy;
use crate::submissions_repo::SubmissionsRepository;
use crate::video_purchases_repo::VideoPurchasesRepository;
use crate::web::PgPool;

/// Identifiers carried by the checkout session that get stamped onto the
/// payment record when it transitions.
#[derive(Debug, Clone, Default)]
pub struct SessionRefs {
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
}

impl SessionRefs {
    pub fn from_session(session: &stripe::CheckoutSession) -> Self {
        Self {
            checkout_session_id: Some(session.id.to_string()),
            payment_intent_id: session
                .payment_intent
                .as_ref()
                .map(|intent| intent.id().to_string()),
        }
    }
}

/// checkout.session.completed, routed by the session's escrow purpose. Each
/// arm is one repository transaction; notifications go out only after the
/// transaction committed, and never affect the result.
pub async fn handle_checkout_completed(
    pool: &PgPool,
    retry: &RetryPolicy,
    purpose: EscrowPurpose,
    refs: SessionRefs,
) -> Result<(), ProcessError> {
    match purpose {
        EscrowPurpose::ContestFunding { contest_id } => {
            let repo = ContestsRepository::new(pool.clone());
            match repo
                .finalize_from_draft(
                    contest_id,
                    refs.checkout_session_id,
                    refs.payment_intent_id,
                )
                .await?
            {
                ContestFinalization::Finalized(contest) => {
                    info!(contest_id = %contest.id, "Contest funded and published");
                    notifications::send(
                        pool,
                        contest.brand_id,
                        "Contest is live",
                        &format!("Your contest \"{}\" is funded and now live.", contest.title),
                    )
                    .await;
                    Ok(())
                }
                ContestFinalization::AlreadyFinalized(contest) => {
                    info!(contest_id = %contest.id, "Contest already finalized, skipping");
                    Ok(())
                }
                ContestFinalization::NotFound => {
                    Err(ProcessError::not_found("contest draft", contest_id))
                }
            }
        }

        EscrowPurpose::OrderEscrow { order_id } => {
            let repo = OrdersRepository::new(pool.clone());
            let order = repo
                .mark_held_in_escrow(order_id, refs.checkout_session_id, refs.payment_intent_id)
                .await?
                .ok_or_else(|| ProcessError::not_found("order", order_id))?;

            info!(order_id = %order.id, "Order payment held in escrow");
            notifications::send(
                pool,
                order.brand_id,
                "Payment received",
                "Your payment is held in escrow until the order is delivered.",
            )
            .await;
            notifications::send(
                pool,
                order.creator_id,
                "New paid order",
                "A brand has funded an order for you. Time to get to work!",
            )
            .await;
            Ok(())
        }

        // The purchase row is written by the client after checkout and can
        // lag the webhook, hence the retry wrapper around this arm only.
        EscrowPurpose::VideoPurchase {
            video_id,
            payment_id,
            buyer_id,
            creator_id,
        } => {
            let repo = VideoPurchasesRepository::new(pool.clone());
            let purchase = retry
                .run(|| {
                    let repo = repo.clone();
                    let refs = refs.clone();
                    async move {
                        repo.complete_purchase(
                            payment_id,
                            refs.checkout_session_id,
                            refs.payment_intent_id,
                        )
                        .await
                        .map_err(ProcessError::from)?
                        .ok_or_else(|| ProcessError::not_found("video purchase", payment_id))
                    }
                })
                .await?;

            info!(
                video_id = %video_id,
                purchase_id = %purchase.id,
                "Video purchase completed"
            );
            notifications::send(
                pool,
                buyer_id,
                "Purchase complete",
                "Your video purchase went through. Enjoy!",
            )
            .await;
            notifications::send(
                pool,
                creator_id,
                "Video sold",
                "One of your videos was just purchased.",
            )
            .await;
            Ok(())
        }

        EscrowPurpose::SubmissionApproval {
            submission_id,
            project_id,
            creator_id,
        } => {
            let repo = SubmissionsRepository::new(pool.clone());
            let submission = repo
                .approve_paid(
                    submission_id,
                    project_id,
                    refs.checkout_session_id,
                    refs.payment_intent_id,
                )
                .await?
                .ok_or_else(|| ProcessError::not_found("submission", submission_id))?;

            info!(
                submission_id = %submission.id,
                project_id = %project_id,
                "Submission approved with payment"
            );
            notifications::send(
                pool,
                creator_id,
                "Submission approved",
                "Your submission was approved and the payment is on its way.",
            )
            .await;
            Ok(())
        }
    }
}

/// checkout.session.expired — release whatever record the session was
/// reserving. Missing or already-transitioned records are logged no-ops;
/// there is nothing for the provider to usefully redeliver here.
pub async fn handle_checkout_expired(
    pool: &PgPool,
    purpose: EscrowPurpose,
) -> Result<(), ProcessError> {
    match purpose {
        EscrowPurpose::ContestFunding { contest_id } => {
            let repo = PaymentsRepository::new(pool.clone());
            let count = repo.expire_pending_by_contest(contest_id).await?;
            info!(contest_id = %contest_id, expired = count, "Contest checkout expired");
        }
        EscrowPurpose::OrderEscrow { order_id } => {
            let repo = OrdersRepository::new(pool.clone());
            match repo.mark_expired(order_id).await? {
                Some(order) => info!(order_id = %order.id, "Order checkout expired"),
                None => warn!(order_id = %order_id, "Expired session for unknown order"),
            }
        }
        EscrowPurpose::VideoPurchase { payment_id, .. } => {
            let repo = VideoPurchasesRepository::new(pool.clone());
            match repo.mark_expired(payment_id).await? {
                Some(purchase) => {
                    info!(purchase_id = %purchase.id, "Video purchase checkout expired");
                }
                None => {
                    // The browser that would have written the purchase row
                    // never confirmed, which is the normal way a session
                    // expires. The payment row still exists and must not
                    // stay pending.
                    let count = PaymentsRepository::new(pool.clone())
                        .expire_pending_by_id(payment_id)
                        .await?;
                    info!(
                        payment_id = %payment_id,
                        expired = count,
                        "Video purchase checkout expired before purchase was recorded"
                    );
                }
            }
        }
        EscrowPurpose::SubmissionApproval { submission_id, .. } => {
            let repo = PaymentsRepository::new(pool.clone());
            let count = repo.expire_pending_by_submission(submission_id).await?;
            info!(submission_id = %submission_id, expired = count, "Approval checkout expired");
        }
    }
    Ok(())
}

/// payment_intent.succeeded / .payment_failed / .canceled. These arrive for
/// intents the checkout flow already settled as well as for intents we never
/// created; an unknown intent id is a logged no-op so replays and foreign
/// events do not turn into redelivery loops.
pub async fn handle_payment_intent(
    pool: &PgPool,
    payment_intent_id: &str,
    next: EscrowStatus,
) -> Result<(), ProcessError> {
    let repo = PaymentsRepository::new(pool.clone());
    match repo.transition_by_intent(payment_intent_id, next).await? {
        Some(payment) => {
            info!(
                payment_id = %payment.id,
                payment_intent_id = %payment_intent_id,
                status = ?payment.status,
                "Payment intent applied"
            );
        }
        None => {
            info!(
                payment_intent_id = %payment_intent_id,
                "Payment intent for unknown payment, ignoring"
            );
        }
    }
    Ok(())
}
