use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{error, info};
use uuid::Uuid;

use crate::subscription_lifecycle;
use crate::subscriptions_repo::SubscriptionsRepository;
use crate::users_repo::UsersRepository;
use crate::web::AppState;

use super::{
    DataResponse, json_error,
    views::{CustomerView, SubscriptionView, VerifiedSubscriptionView, VerifySubscriptionRequest},
};

/// POST /data/subscriptions/verify
///
/// Synchronous read path for a client landing back from checkout before the
/// webhook has necessarily arrived. Reconciles against the provider when the
/// local record is still pending and returns the (possibly updated) record.
pub async fn verify_subscription(
    State(state): State<AppState>,
    Json(request): Json<VerifySubscriptionRequest>,
) -> impl IntoResponse {
    let Some(stripe_config) = state.stripe.clone() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let Ok(subscription_id) = request.subscription_id.parse::<Uuid>() else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid subscription id").into_response();
    };

    let repo = SubscriptionsRepository::new(state.pool.clone());
    let local = match repo.get_by_id(subscription_id).await {
        Ok(Some(subscription)) => subscription,
        Ok(None) => {
            return json_error(StatusCode::NOT_FOUND, "Subscription not found").into_response();
        }
        Err(e) => {
            error!(error = %e, "Failed to load subscription for verification");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to verify subscription",
            )
            .into_response();
        }
    };

    match subscription_lifecycle::reconcile_with_provider(
        &state.pool,
        &stripe_config,
        local,
        request.checkout_session_id.as_deref(),
    )
    .await
    {
        Ok(subscription) => {
            let customer = match UsersRepository::new(state.pool.clone())
                .get_by_id(subscription.user_id)
                .await
            {
                Ok(Some(user)) => user,
                Ok(None) => {
                    error!(
                        subscription_id = %subscription.id,
                        user_id = %subscription.user_id,
                        "Subscription references a missing user"
                    );
                    return json_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to verify subscription",
                    )
                    .into_response();
                }
                Err(e) => {
                    error!(subscription_id = %subscription.id, error = %e, "Failed to load customer");
                    return json_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to verify subscription",
                    )
                    .into_response();
                }
            };

            info!(
                subscription_id = %subscription.id,
                status = subscription.status.as_str(),
                "Subscription verified"
            );
            Json(DataResponse {
                data: VerifiedSubscriptionView {
                    subscription: SubscriptionView::from(subscription),
                    customer: CustomerView::from(customer),
                },
            })
            .into_response()
        }
        Err(e) => {
            error!(subscription_id = %subscription_id, error = %e, "Subscription verification failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to verify subscription",
            )
            .into_response()
        }
    }
}
