use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::time::Instant;
use uuid::Uuid;

use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::actions;
use crate::retry::RetryPolicy;
use crate::stripe_client::StripeConfig;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

// App state for sharing database pool and Stripe configuration
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// None when Stripe env vars are absent; webhook and verification
    /// endpoints answer 503 in that case instead of failing at startup.
    pub stripe: Option<StripeConfig>,
    pub retry: RetryPolicy,
}

// Middleware for request logging with correlation ID
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    let start_time = Instant::now();

    info!("Started {} {} [{}]", method, path, request_id);

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status = response.status();

    info!(
        "Completed {} {} [{}] {} in {:.2}ms",
        method,
        path,
        request_id,
        status.as_u16(),
        duration.as_secs_f64() * 1000.0
    );

    response
}

// Middleware to capture HTTP errors to Sentry
async fn sentry_error_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    // Capture HTTP 5xx errors to Sentry
    if response.status().is_server_error() {
        let status = response.status();
        error!("HTTP {} error on {} {}", status.as_u16(), method, uri);

        sentry::configure_scope(|scope| {
            scope.set_tag("http.method", method.as_str());
            scope.set_tag("http.url", uri.to_string());
            scope.set_tag("http.status_code", status.as_u16().to_string());
        });

        sentry::capture_message(
            &format!("HTTP {} error on {} {}", status.as_u16(), method, uri),
            sentry::Level::Error,
        );
    }

    response
}

pub async fn start_web_server(
    interface: String,
    port: u16,
    pool: PgPool,
    stripe: Option<StripeConfig>,
) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "web-server");
    });
    info!("Starting web server on {}:{}", interface, port);

    if stripe.is_none() {
        error!("Stripe is not configured; payment endpoints will answer 503");
    }

    let app_state = AppState {
        pool,
        stripe,
        retry: RetryPolicy::default(),
    };

    // Create CORS layer that allows all origins and methods
    let cors_layer = CorsLayer::permissive();

    // Create API sub-router rooted at "/data"
    let api_router = Router::new()
        .route(
            "/subscriptions/verify",
            post(actions::verify_subscription),
        )
        .with_state(app_state.clone());

    // Build the main Axum application
    let app = Router::new()
        .route("/stripe/webhooks", post(actions::handle_stripe_webhook))
        .nest("/data", api_router)
        .with_state(app_state.clone())
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(sentry_error_middleware))
        .layer(cors_layer);

    // Create the listener
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", interface, port)).await?;
    info!("Web server listening on http://{}:{}", interface, port);

    // Start the server
    axum::serve(listener, app).await?;

    Ok(())
}
