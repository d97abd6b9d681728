mod common;

use common::TestDatabase;
use uuid::Uuid;

use brandreel::payments::{EscrowStatus, NewPayment, PaymentPurpose};
use brandreel::payments_repo::PaymentsRepository;
use brandreel::projects::NewProject;
use brandreel::projects_repo::ProjectsRepository;
use brandreel::submissions::{NewProjectSubmission, SubmissionStatus};
use brandreel::submissions_repo::SubmissionsRepository;
use brandreel::web::PgPool;

struct Seeded {
    project_id: Uuid,
    submission_id: Uuid,
    payment_id: Uuid,
}

async fn seed_submission(pool: &PgPool) -> Seeded {
    let project_id = Uuid::now_v7();
    let submission_id = Uuid::now_v7();
    let creator_id = Uuid::now_v7();
    let payment_id = Uuid::now_v7();

    ProjectsRepository::new(pool.clone())
        .create(NewProject {
            id: project_id,
            brand_id: Uuid::now_v7(),
            title: "Spring campaign".to_string(),
        })
        .await
        .unwrap();

    SubmissionsRepository::new(pool.clone())
        .create(NewProjectSubmission {
            id: submission_id,
            project_id,
            creator_id,
            status: SubmissionStatus::Submitted,
            payment_id: None,
        })
        .await
        .unwrap();

    PaymentsRepository::new(pool.clone())
        .create(NewPayment {
            id: payment_id,
            purpose: PaymentPurpose::SubmissionApproval,
            status: EscrowStatus::Pending,
            amount_cents: 15_000,
            currency: "usd".to_string(),
            stripe_checkout_session_id: None,
            buyer_id: None,
            brand_id: None,
            creator_id: Some(creator_id),
            order_id: None,
            video_id: None,
            contest_id: None,
            submission_id: Some(submission_id),
        })
        .await
        .unwrap();

    Seeded {
        project_id,
        submission_id,
        payment_id,
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn paid_approval_flips_status_and_counts_once() {
    let db = TestDatabase::new().await.expect("test database");
    let pool = db.pool();
    let seeded = seed_submission(&pool).await;

    let repo = SubmissionsRepository::new(pool.clone());
    let submission = repo
        .approve_paid(
            seeded.submission_id,
            seeded.project_id,
            Some("cs_sub".to_string()),
            Some("pi_sub".to_string()),
        )
        .await
        .unwrap()
        .expect("submission exists");

    assert_eq!(submission.status, SubmissionStatus::Approved);
    assert!(submission.approved_at.is_some());

    let project = ProjectsRepository::new(pool.clone())
        .get_by_id(seeded.project_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project.approved_submissions, 1);

    let payment = PaymentsRepository::new(pool)
        .get_by_payment_intent_id("pi_sub")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, EscrowStatus::Approved);
}

// A duplicate delivery slipping past the event-id gate must not double the
// counter: the status precondition makes the second run a no-op.
#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn duplicate_approval_does_not_double_count() {
    let db = TestDatabase::new().await.expect("test database");
    let pool = db.pool();
    let seeded = seed_submission(&pool).await;

    let repo = SubmissionsRepository::new(pool.clone());
    repo.approve_paid(seeded.submission_id, seeded.project_id, None, None)
        .await
        .unwrap();
    repo.approve_paid(seeded.submission_id, seeded.project_id, None, None)
        .await
        .unwrap();

    let project = ProjectsRepository::new(pool)
        .get_by_id(seeded.project_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project.approved_submissions, 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn unknown_submission_reports_missing() {
    let db = TestDatabase::new().await.expect("test database");
    let repo = SubmissionsRepository::new(db.pool());

    let result = repo
        .approve_paid(Uuid::now_v7(), Uuid::now_v7(), None, None)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn expired_session_stamps_pending_approval_payment() {
    let db = TestDatabase::new().await.expect("test database");
    let pool = db.pool();
    let seeded = seed_submission(&pool).await;

    let payments = PaymentsRepository::new(pool);
    let expired = payments
        .expire_pending_by_submission(seeded.submission_id)
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let payment = payments
        .get_by_id(seeded.payment_id)
        .await
        .unwrap()
        .expect("approval payment");
    assert_eq!(payment.status, EscrowStatus::CheckoutExpired);
    assert!(payment.expired_at.is_some());
}
