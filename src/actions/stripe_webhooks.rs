use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use stripe::{Event, EventObject, Webhook};
use tracing::{error, info, warn};

use crate::escrow::{EscrowPurpose, ProcessError};
use crate::escrow_handlers::{self, SessionRefs};
use crate::payments::EscrowStatus;
use crate::processed_events_repo::ProcessedEventsRepository;
use crate::stripe_client::StripeConfig;
use crate::stripe_webhooks::{AuditStatus, NewStripeWebhookEvent};
use crate::stripe_webhooks_repo::StripeWebhookEventsRepository;
use crate::subscription_lifecycle;
use crate::web::AppState;

fn received() -> Json<serde_json::Value> {
    Json(json!({ "received": true }))
}

fn object_id(event: &Event) -> Option<String> {
    match &event.data.object {
        EventObject::CheckoutSession(session) => Some(session.id.to_string()),
        EventObject::PaymentIntent(intent) => Some(intent.id.to_string()),
        EventObject::Subscription(sub) => Some(sub.id.to_string()),
        EventObject::Invoice(invoice) => Some(invoice.id.to_string()),
        _ => None,
    }
}

/// POST /stripe/webhooks
///
/// Verify, deduplicate, route, audit. Responds 200 with `{"received": true}`
/// on success and on replays, 400 on a bad signature, and 5xx when the
/// handler fails so the provider redelivers. The idempotency ledger is only
/// written after a successful handler run; the audit log gets a row per
/// attempt either way.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let stripe_config = match &state.stripe {
        Some(config) => config.clone(),
        None => {
            error!("Webhook received but Stripe is not configured");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    metrics::counter!("stripe.webhook.received").increment(1);
    let start = std::time::Instant::now();

    // Get the Stripe-Signature header
    let signature = match headers.get("Stripe-Signature").and_then(|s| s.to_str().ok()) {
        Some(sig) => sig.to_string(),
        None => {
            metrics::counter!("stripe.webhook.signature_invalid").increment(1);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let payload = match std::str::from_utf8(&body) {
        Ok(s) => s,
        Err(_) => {
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // Verify the webhook signature before trusting anything in the body
    let event = match Webhook::construct_event(payload, &signature, &stripe_config.webhook_secret)
    {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Invalid webhook signature");
            metrics::counter!("stripe.webhook.signature_invalid").increment(1);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let event_id = event.id.to_string();
    let event_type = event.type_.to_string();

    // Idempotency gate: replays answer success without touching a handler
    let processed_repo = ProcessedEventsRepository::new(state.pool.clone());
    match processed_repo.is_processed(&event_id).await {
        Ok(true) => {
            info!(event_id = %event_id, event_type = %event_type, "Replay of processed event");
            metrics::counter!("stripe.webhook.replayed").increment(1);
            return (StatusCode::OK, received()).into_response();
        }
        Ok(false) => {}
        Err(e) => {
            // Fall through to the handlers, whose transactional guards hold
            // even when the gate cannot be consulted.
            error!(error = %e, event_id = %event_id, "Failed to check webhook idempotency");
        }
    }

    let result = process_webhook_event(&state, &stripe_config, &event_type, &event).await;

    // One append-only audit row per attempt, success or failure
    let audit_repo = StripeWebhookEventsRepository::new(state.pool.clone());
    let (status, processing_error) = match &result {
        Ok(()) => (AuditStatus::Processed, None),
        Err(e) => (AuditStatus::Failed, Some(e.to_string())),
    };
    let audit_entry = NewStripeWebhookEvent {
        stripe_event_id: event_id.clone(),
        event_type: event_type.clone(),
        status: status.as_str().to_string(),
        processing_error,
        object_id: object_id(&event),
        livemode: event.livemode,
        payload: serde_json::to_value(&event).unwrap_or_default(),
    };
    if let Err(e) = audit_repo.record_attempt(audit_entry).await {
        warn!(error = %e, event_id = %event_id, "Failed to record webhook audit entry");
    }

    let response = match result {
        Ok(()) => {
            if let Err(e) = processed_repo.mark_processed(&event_id, &event_type).await {
                // Redelivery will hit the handlers again; they are idempotent
                error!(error = %e, event_id = %event_id, "Failed to mark webhook as processed");
            }
            metrics::counter!("stripe.webhook.processed").increment(1);
            (StatusCode::OK, received()).into_response()
        }
        Err(e) => {
            error!(event_id = %event_id, event_type = %event_type, error = %e, "Failed to process webhook event");
            metrics::counter!("stripe.webhook.failed").increment(1);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    let duration_ms = start.elapsed().as_millis() as f64;
    metrics::histogram!("stripe.webhook.processing_ms").record(duration_ms);

    response
}

async fn process_webhook_event(
    state: &AppState,
    stripe_config: &StripeConfig,
    event_type: &str,
    event: &Event,
) -> Result<(), ProcessError> {
    match event_type {
        "checkout.session.completed" => {
            if let EventObject::CheckoutSession(session) = &event.data.object {
                let Some(purpose) = session
                    .metadata
                    .as_ref()
                    .and_then(EscrowPurpose::from_metadata)
                else {
                    // Subscription checkouts and foreign sessions land here;
                    // the subscription events carry their own routing.
                    info!(session = %session.id, "Checkout session without escrow purpose, ignoring");
                    return Ok(());
                };

                metrics::counter!("stripe.webhook.escrow", "purpose" => purpose.kind())
                    .increment(1);
                let refs = SessionRefs::from_session(session);
                escrow_handlers::handle_checkout_completed(
                    &state.pool,
                    &state.retry,
                    purpose,
                    refs,
                )
                .await?;
            }
        }
        "checkout.session.expired" => {
            if let EventObject::CheckoutSession(session) = &event.data.object {
                let Some(purpose) = session
                    .metadata
                    .as_ref()
                    .and_then(EscrowPurpose::from_metadata)
                else {
                    info!(session = %session.id, "Expired session without escrow purpose, ignoring");
                    return Ok(());
                };
                escrow_handlers::handle_checkout_expired(&state.pool, purpose).await?;
            }
        }
        "payment_intent.succeeded" => {
            if let EventObject::PaymentIntent(intent) = &event.data.object {
                escrow_handlers::handle_payment_intent(
                    &state.pool,
                    &intent.id.to_string(),
                    EscrowStatus::PaidToPlatform,
                )
                .await?;
            }
        }
        "payment_intent.payment_failed" => {
            if let EventObject::PaymentIntent(intent) = &event.data.object {
                escrow_handlers::handle_payment_intent(
                    &state.pool,
                    &intent.id.to_string(),
                    EscrowStatus::PaymentFailed,
                )
                .await?;
            }
        }
        "payment_intent.canceled" => {
            if let EventObject::PaymentIntent(intent) = &event.data.object {
                escrow_handlers::handle_payment_intent(
                    &state.pool,
                    &intent.id.to_string(),
                    EscrowStatus::CheckoutExpired,
                )
                .await?;
            }
        }
        "customer.subscription.created" => {
            if let EventObject::Subscription(sub) = &event.data.object {
                subscription_lifecycle::on_subscription_created(&state.pool, sub).await?;
            }
        }
        "customer.subscription.updated" => {
            if let EventObject::Subscription(sub) = &event.data.object {
                subscription_lifecycle::on_subscription_updated(&state.pool, sub).await?;
            }
        }
        "customer.subscription.trial_will_end" => {
            if let EventObject::Subscription(sub) = &event.data.object {
                subscription_lifecycle::on_trial_will_end(&state.pool, sub).await?;
            }
        }
        "customer.subscription.deleted" => {
            if let EventObject::Subscription(sub) = &event.data.object {
                subscription_lifecycle::on_subscription_deleted(&state.pool, sub).await?;
            }
        }
        "invoice.payment_succeeded" => {
            if let EventObject::Invoice(invoice) = &event.data.object {
                subscription_lifecycle::on_invoice_payment_succeeded(
                    &state.pool,
                    stripe_config,
                    invoice,
                )
                .await?;
            }
        }
        "invoice.payment_failed" => {
            if let EventObject::Invoice(invoice) = &event.data.object {
                subscription_lifecycle::on_invoice_payment_failed(&state.pool, invoice).await?;
            }
        }
        other => {
            info!(event_type = %other, "Unhandled webhook event type");
            metrics::counter!("stripe.webhook.unhandled").increment(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use stripe::{Webhook, WebhookError};

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        let v1 = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={v1}")
    }

    #[test]
    fn wrong_secret_is_rejected_before_parsing() {
        let payload = r#"{"anything": true}"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign(payload, "whsec_other_secret", now);

        let err = Webhook::construct_event(payload, &header, SECRET).unwrap_err();
        assert!(matches!(err, WebhookError::BadSignature));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let now = chrono::Utc::now().timestamp();
        let header = sign(r#"{"amount": 100}"#, SECRET, now);

        let err = Webhook::construct_event(r#"{"amount": 99999}"#, &header, SECRET).unwrap_err();
        assert!(matches!(err, WebhookError::BadSignature));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = r#"{"anything": true}"#;
        let stale = chrono::Utc::now().timestamp() - 3600;
        let header = sign(payload, SECRET, stale);

        let err = Webhook::construct_event(payload, &header, SECRET).unwrap_err();
        assert!(matches!(err, WebhookError::BadTimestamp(_)));
    }

    #[test]
    fn garbled_header_is_rejected() {
        let err = Webhook::construct_event("{}", "not-a-signature-header", SECRET).unwrap_err();
        assert!(matches!(err, WebhookError::BadSignature | WebhookError::BadHeader(_)));
    }

    // A valid signature over a payload that is not a Stripe event gets past
    // the signature check and fails at the parse step instead.
    #[test]
    fn valid_signature_reaches_the_parser() {
        let payload = r#"{"not_an_event": true}"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign(payload, SECRET, now);

        let err = Webhook::construct_event(payload, &header, SECRET).unwrap_err();
        assert!(matches!(err, WebhookError::BadParse(_)));
    }
}
