mod common;

use common::TestDatabase;
use uuid::Uuid;

use brandreel::orders::NewOrder;
use brandreel::orders_repo::OrdersRepository;
use brandreel::payments::{EscrowStatus, NewPayment, PaymentPurpose};
use brandreel::payments_repo::PaymentsRepository;
use brandreel::users::NewUser;
use brandreel::users_repo::UsersRepository;
use brandreel::web::PgPool;

async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
    let repo = UsersRepository::new(pool.clone());
    let user = repo
        .create(NewUser {
            id: Uuid::now_v7(),
            email: format!("{name}@example.com"),
            display_name: name.to_string(),
        })
        .await
        .unwrap();
    user.id
}

async fn seed_order(pool: &PgPool, brand_id: Uuid, creator_id: Uuid) -> Uuid {
    let order_id = Uuid::now_v7();
    let payment_id = Uuid::now_v7();

    OrdersRepository::new(pool.clone())
        .create(NewOrder {
            id: order_id,
            brand_id,
            creator_id,
            amount_cents: 25_000,
            status: EscrowStatus::Pending,
            payment_id: Some(payment_id),
        })
        .await
        .unwrap();

    PaymentsRepository::new(pool.clone())
        .create(NewPayment {
            id: payment_id,
            purpose: PaymentPurpose::OrderEscrow,
            status: EscrowStatus::Pending,
            amount_cents: 25_000,
            currency: "usd".to_string(),
            stripe_checkout_session_id: None,
            buyer_id: None,
            brand_id: Some(brand_id),
            creator_id: Some(creator_id),
            order_id: Some(order_id),
            video_id: None,
            contest_id: None,
            submission_id: None,
        })
        .await
        .unwrap();

    order_id
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn completed_checkout_holds_order_in_escrow() {
    let db = TestDatabase::new().await.expect("test database");
    let pool = db.pool();
    let brand = seed_user(&pool, "brand").await;
    let creator = seed_user(&pool, "creator").await;
    let order_id = seed_order(&pool, brand, creator).await;

    let repo = OrdersRepository::new(pool.clone());
    let order = repo
        .mark_held_in_escrow(
            order_id,
            Some("cs_test_order".to_string()),
            Some("pi_test_order".to_string()),
        )
        .await
        .unwrap()
        .expect("order exists");

    assert_eq!(order.status, EscrowStatus::HeldInEscrow);
    assert!(order.held_at.is_some());

    let payment = PaymentsRepository::new(pool)
        .get_by_payment_intent_id("pi_test_order")
        .await
        .unwrap()
        .expect("payment stamped with intent id");
    assert_eq!(payment.status, EscrowStatus::HeldInEscrow);
    assert_eq!(
        payment.stripe_checkout_session_id.as_deref(),
        Some("cs_test_order")
    );
    assert!(payment.paid_at.is_some());
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn duplicate_delivery_leaves_order_unchanged() {
    let db = TestDatabase::new().await.expect("test database");
    let pool = db.pool();
    let brand = seed_user(&pool, "brand").await;
    let creator = seed_user(&pool, "creator").await;
    let order_id = seed_order(&pool, brand, creator).await;

    let repo = OrdersRepository::new(pool.clone());
    let first = repo
        .mark_held_in_escrow(order_id, Some("cs_1".into()), Some("pi_1".into()))
        .await
        .unwrap()
        .unwrap();
    let second = repo
        .mark_held_in_escrow(order_id, Some("cs_1".into()), Some("pi_1".into()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(second.status, EscrowStatus::HeldInEscrow);
    assert_eq!(second.held_at, first.held_at);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn unknown_order_reports_missing() {
    let db = TestDatabase::new().await.expect("test database");
    let repo = OrdersRepository::new(db.pool());

    let result = repo
        .mark_held_in_escrow(Uuid::now_v7(), None, None)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn expired_session_releases_pending_order_only() {
    let db = TestDatabase::new().await.expect("test database");
    let pool = db.pool();
    let brand = seed_user(&pool, "brand").await;
    let creator = seed_user(&pool, "creator").await;

    let repo = OrdersRepository::new(pool.clone());

    // Pending order expires
    let pending = seed_order(&pool, brand, creator).await;
    let expired = repo.mark_expired(pending).await.unwrap().unwrap();
    assert_eq!(expired.status, EscrowStatus::CheckoutExpired);
    assert!(expired.expired_at.is_some());

    // Funded order is left alone by a late expiry event
    let funded = seed_order(&pool, brand, creator).await;
    repo.mark_held_in_escrow(funded, Some("cs_2".into()), Some("pi_2".into()))
        .await
        .unwrap();
    let untouched = repo.mark_expired(funded).await.unwrap().unwrap();
    assert_eq!(untouched.status, EscrowStatus::HeldInEscrow);
}

// Delayed payment failure after funding: held_in_escrow -> payment_failed,
// and the terminal state rejects any further transition.
#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn late_intent_failure_moves_payment_to_failed() {
    let db = TestDatabase::new().await.expect("test database");
    let pool = db.pool();
    let brand = seed_user(&pool, "brand").await;
    let creator = seed_user(&pool, "creator").await;
    let order_id = seed_order(&pool, brand, creator).await;

    OrdersRepository::new(pool.clone())
        .mark_held_in_escrow(order_id, Some("cs_3".into()), Some("pi_3".into()))
        .await
        .unwrap();

    let payments = PaymentsRepository::new(pool);
    let failed = payments
        .transition_by_intent("pi_3", EscrowStatus::PaymentFailed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, EscrowStatus::PaymentFailed);
    assert!(failed.failed_at.is_some());

    // Terminal: a replayed success event cannot resurrect the payment
    let still_failed = payments
        .transition_by_intent("pi_3", EscrowStatus::PaidToPlatform)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_failed.status, EscrowStatus::PaymentFailed);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn unknown_intent_is_a_no_op() {
    let db = TestDatabase::new().await.expect("test database");
    let payments = PaymentsRepository::new(db.pool());

    let result = payments
        .transition_by_intent("pi_never_seen", EscrowStatus::PaidToPlatform)
        .await
        .unwrap();
    assert!(result.is_none());
}
