mod common;

use common::TestDatabase;

use brandreel::processed_events_repo::ProcessedEventsRepository;
use brandreel::stripe_webhooks::{AuditStatus, NewStripeWebhookEvent};
use brandreel::stripe_webhooks_repo::StripeWebhookEventsRepository;

fn audit_entry(event_id: &str, status: AuditStatus, error: Option<&str>) -> NewStripeWebhookEvent {
    NewStripeWebhookEvent {
        stripe_event_id: event_id.to_string(),
        event_type: "checkout.session.completed".to_string(),
        status: status.as_str().to_string(),
        processing_error: error.map(str::to_string),
        object_id: Some("cs_test_123".to_string()),
        livemode: false,
        payload: serde_json::json!({"id": event_id}),
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn event_is_processed_only_after_mark() {
    let db = TestDatabase::new().await.expect("test database");
    let repo = ProcessedEventsRepository::new(db.pool());

    assert!(!repo.is_processed("evt_fresh").await.unwrap());

    repo.mark_processed("evt_fresh", "checkout.session.completed")
        .await
        .unwrap();

    assert!(repo.is_processed("evt_fresh").await.unwrap());
    assert!(!repo.is_processed("evt_other").await.unwrap());
}

// Two concurrent deliveries can both pass the check and both try to mark;
// the second write must be absorbed, not error.
#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn duplicate_mark_is_absorbed() {
    let db = TestDatabase::new().await.expect("test database");
    let repo = ProcessedEventsRepository::new(db.pool());

    repo.mark_processed("evt_dup", "payment_intent.succeeded")
        .await
        .unwrap();
    repo.mark_processed("evt_dup", "payment_intent.succeeded")
        .await
        .unwrap();

    assert!(repo.is_processed("evt_dup").await.unwrap());
}

// A failed attempt followed by a successful redelivery leaves two audit
// rows for the same event id, oldest first.
#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn audit_log_appends_one_row_per_attempt() {
    let db = TestDatabase::new().await.expect("test database");
    let repo = StripeWebhookEventsRepository::new(db.pool());

    repo.record_attempt(audit_entry(
        "evt_retry",
        AuditStatus::Failed,
        Some("order not found: 9b2d"),
    ))
    .await
    .unwrap();
    repo.record_attempt(audit_entry("evt_retry", AuditStatus::Processed, None))
        .await
        .unwrap();

    let entries = repo.get_by_event_id("evt_retry").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, "failed");
    assert_eq!(
        entries[0].processing_error.as_deref(),
        Some("order not found: 9b2d")
    );
    assert_eq!(entries[1].status, "processed");
    assert!(entries[1].processing_error.is_none());
    assert!(entries[0].created_at <= entries[1].created_at);
}
