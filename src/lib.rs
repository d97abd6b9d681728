//! Payment-event and escrow processing core for the BrandReel marketplace.
//!
//! Receives Stripe webhook events, verifies and deduplicates them, and
//! routes them to transactional handlers for escrowed payments (contests,
//! orders, video purchases, submission approvals) and subscription
//! lifecycle state.

pub mod actions;
pub mod contests;
pub mod contests_repo;
pub mod escrow;
pub mod escrow_handlers;
pub mod notifications;
pub mod notifications_repo;
pub mod orders;
pub mod orders_repo;
pub mod payments;
pub mod payments_repo;
pub mod processed_events;
pub mod processed_events_repo;
pub mod projects;
pub mod projects_repo;
pub mod retry;
pub mod schema;
pub mod stripe_client;
pub mod stripe_webhooks;
pub mod stripe_webhooks_repo;
pub mod submissions;
pub mod submissions_repo;
pub mod subscription_lifecycle;
pub mod subscriptions;
pub mod subscriptions_repo;
pub mod users;
pub mod users_repo;
pub mod video_purchases;
pub mod video_purchases_repo;
pub mod web;
