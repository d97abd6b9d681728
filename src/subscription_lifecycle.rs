use anyhow::anyhow;
use chrono::{DateTime, Days, Months, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::escrow::ProcessError;
use crate::notifications;
use crate::stripe_client::StripeConfig;
use crate::subscriptions::{
    BillingInterval, Subscription, SubscriptionPatch, SubscriptionStatus,
};
use crate::subscriptions_repo::SubscriptionsRepository;
use crate::web::PgPool;

/// Period end for a trialing subscription: the provider does not populate
/// period fields during the trial, so the first billing period is the trial
/// end advanced by one billing interval. Pure; the webhook handlers and the
/// verification read path both use it and must agree.
pub fn derive_period_end(
    trial_end: DateTime<Utc>,
    interval: BillingInterval,
    interval_count: i32,
) -> Option<DateTime<Utc>> {
    let n = u32::try_from(interval_count).ok()?;
    match interval {
        BillingInterval::Day => trial_end.checked_add_days(Days::new(n as u64)),
        BillingInterval::Week => trial_end.checked_add_days(Days::new(7 * n as u64)),
        BillingInterval::Month => trial_end.checked_add_months(Months::new(n)),
        BillingInterval::Year => trial_end.checked_add_months(Months::new(12 * n)),
    }
}

/// Which notification (title, body) a status transition produces, if any
pub fn transition_notification(
    old: SubscriptionStatus,
    new: SubscriptionStatus,
) -> Option<(&'static str, &'static str)> {
    if old == new {
        return None;
    }
    match new {
        SubscriptionStatus::Active => Some((
            "Subscription active",
            "Your subscription is now active. Welcome aboard!",
        )),
        SubscriptionStatus::Canceled => Some((
            "Subscription canceled",
            "Your subscription has been canceled. We're sorry to see you go.",
        )),
        SubscriptionStatus::PastDue => Some((
            "Payment problem",
            "We could not collect your subscription payment. Please update your payment method.",
        )),
        _ => None,
    }
}

fn map_status(status: stripe::SubscriptionStatus) -> SubscriptionStatus {
    use stripe::SubscriptionStatus as S;
    match status {
        S::Trialing => SubscriptionStatus::Trialing,
        S::Active => SubscriptionStatus::Active,
        S::PastDue => SubscriptionStatus::PastDue,
        S::Unpaid => SubscriptionStatus::Unpaid,
        S::Canceled | S::IncompleteExpired => SubscriptionStatus::Canceled,
        S::Incomplete | S::Paused => SubscriptionStatus::Pending,
    }
}

fn map_interval(interval: stripe::RecurringInterval) -> BillingInterval {
    use stripe::RecurringInterval as I;
    match interval {
        I::Day => BillingInterval::Day,
        I::Week => BillingInterval::Week,
        I::Month => BillingInterval::Month,
        I::Year => BillingInterval::Year,
    }
}

fn timestamp(ts: i64) -> Option<DateTime<Utc>> {
    (ts > 0).then(|| DateTime::from_timestamp(ts, 0)).flatten()
}

/// Price amounts arrive as i64 cents; anything outside i32 is not a price
/// this platform sells and is stored as 0 rather than truncated.
fn narrow_amount_cents(unit_amount: Option<i64>) -> i32 {
    match unit_amount {
        Some(a) => i32::try_from(a).unwrap_or_else(|_| {
            warn!(unit_amount = a, "Price amount outside i32 range, storing 0");
            0
        }),
        None => 0,
    }
}

fn narrow_interval_count(count: Option<u64>) -> i32 {
    match count {
        Some(c) => i32::try_from(c).unwrap_or_else(|_| {
            warn!(interval_count = c, "Interval count outside i32 range, using 1");
            1
        }),
        None => 1,
    }
}

/// Whether the paid invoice amount disagrees with the locally stored
/// subscription price. A disagreement is reported, never an error: the
/// provider has already collected the money.
fn amount_mismatch(expected_cents: i32, amount_paid: Option<i64>) -> bool {
    amount_paid.is_some_and(|paid| paid != i64::from(expected_cents))
}

/// Snapshot of the provider-owned subscription fields, extracted from a
/// `stripe::Subscription` once and turned into a `SubscriptionPatch`. Both
/// the webhook handlers and the synchronous verification path go through
/// this type so they converge on identical writes.
#[derive(Debug, Clone)]
pub struct ProviderSubscriptionState {
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub amount_cents: i32,
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub interval_count: i32,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

impl ProviderSubscriptionState {
    pub fn from_stripe(sub: &stripe::Subscription) -> Self {
        let price = sub.items.data.first().and_then(|item| item.price.as_ref());
        let recurring = price.and_then(|p| p.recurring.as_ref());

        Self {
            stripe_subscription_id: sub.id.to_string(),
            stripe_customer_id: Some(sub.customer.id().to_string()),
            status: map_status(sub.status),
            amount_cents: narrow_amount_cents(price.and_then(|p| p.unit_amount)),
            currency: price
                .and_then(|p| p.currency)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "usd".to_string()),
            billing_interval: recurring
                .map(|r| map_interval(r.interval))
                .unwrap_or(BillingInterval::Month),
            interval_count: narrow_interval_count(recurring.map(|r| r.interval_count)),
            trial_start: sub.trial_start.and_then(timestamp),
            trial_end: sub.trial_end.and_then(timestamp),
            current_period_start: timestamp(sub.current_period_start),
            current_period_end: timestamp(sub.current_period_end),
            cancel_at_period_end: sub.cancel_at_period_end,
        }
    }

    /// Build the patch to apply locally, deriving the billing period from
    /// the trial dates while the subscription is trialing.
    pub fn into_patch(self) -> SubscriptionPatch {
        let (period_start, period_end) = if self.status == SubscriptionStatus::Trialing {
            let end = self.trial_end.and_then(|trial_end| {
                derive_period_end(trial_end, self.billing_interval, self.interval_count)
            });
            (self.trial_start, end)
        } else {
            (self.current_period_start, self.current_period_end)
        };

        SubscriptionPatch {
            stripe_subscription_id: Some(self.stripe_subscription_id),
            stripe_customer_id: self.stripe_customer_id,
            status: self.status,
            amount_cents: self.amount_cents,
            currency: self.currency,
            billing_interval: self.billing_interval,
            interval_count: self.interval_count,
            trial_start: self.trial_start,
            trial_end: self.trial_end,
            current_period_start: period_start,
            current_period_end: period_end,
            cancel_at_period_end: self.cancel_at_period_end,
        }
    }
}

fn format_amount(amount_cents: i32, currency: &str) -> String {
    format!(
        "{}.{:02} {}",
        amount_cents / 100,
        amount_cents % 100,
        currency.to_uppercase()
    )
}

/// customer.subscription.created — the only transition keyed by user id:
/// the pending local record does not yet know the provider-assigned id.
/// A missing pending record is a logged no-op, not an error (the event may
/// belong to a subscription created outside this platform instance).
pub async fn on_subscription_created(
    pool: &PgPool,
    sub: &stripe::Subscription,
) -> Result<(), ProcessError> {
    let Some(user_id) = sub
        .metadata
        .get("userId")
        .and_then(|raw| raw.parse::<Uuid>().ok())
    else {
        warn!(subscription = %sub.id, "subscription.created without usable userId metadata");
        return Ok(());
    };

    link_created_subscription(pool, user_id, ProviderSubscriptionState::from_stripe(sub)).await
}

/// Attach a freshly created provider subscription to the user's pending
/// local record and apply the provider state.
pub async fn link_created_subscription(
    pool: &PgPool,
    user_id: Uuid,
    state: ProviderSubscriptionState,
) -> Result<(), ProcessError> {
    let repo = SubscriptionsRepository::new(pool.clone());
    let Some(local) = repo.find_pending_by_user(user_id).await? else {
        warn!(
            user_id = %user_id,
            stripe_subscription_id = %state.stripe_subscription_id,
            "subscription.created with no pending local subscription"
        );
        return Ok(());
    };

    let stripe_subscription_id = state.stripe_subscription_id.clone();
    let patch = state.into_patch();
    let first_charge_amount = format_amount(patch.amount_cents, &patch.currency);
    let first_charge_date = patch.current_period_end;
    let updated = repo.apply_patch(local.id, patch).await?;

    info!(
        subscription_id = %updated.id,
        stripe_subscription_id = %stripe_subscription_id,
        status = ?updated.status,
        "Linked provider subscription to local record"
    );

    if updated.status == SubscriptionStatus::Trialing {
        let when = first_charge_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "the end of your trial".to_string());
        notifications::send(
            pool,
            updated.user_id,
            "Your trial has started",
            &format!("Your free trial is active. You will be charged {first_charge_amount} on {when}."),
        )
        .await;
    }

    Ok(())
}

/// customer.subscription.updated — recompute period/trial fields (clearing
/// trial fields when the event no longer reports them) and notify on the
/// status transitions that matter.
pub async fn on_subscription_updated(
    pool: &PgPool,
    sub: &stripe::Subscription,
) -> Result<(), ProcessError> {
    let repo = SubscriptionsRepository::new(pool.clone());
    let stripe_id = sub.id.to_string();
    let local = repo
        .get_by_stripe_id(&stripe_id)
        .await?
        .ok_or_else(|| ProcessError::not_found("subscription", &stripe_id))?;

    let old_status = local.status;
    let patch = ProviderSubscriptionState::from_stripe(sub).into_patch();
    let updated = repo.apply_patch(local.id, patch).await?;

    if let Some((title, body)) = transition_notification(old_status, updated.status) {
        notifications::send(pool, updated.user_id, title, body).await;
    }

    Ok(())
}

/// customer.subscription.trial_will_end — notification only
pub async fn on_trial_will_end(
    pool: &PgPool,
    sub: &stripe::Subscription,
) -> Result<(), ProcessError> {
    let repo = SubscriptionsRepository::new(pool.clone());
    let stripe_id = sub.id.to_string();
    let Some(local) = repo.get_by_stripe_id(&stripe_id).await? else {
        warn!(stripe_subscription_id = %stripe_id, "trial_will_end for unknown subscription");
        return Ok(());
    };

    let when = local
        .trial_end
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "soon".to_string());
    notifications::send(
        pool,
        local.user_id,
        "Your trial is ending",
        &format!(
            "Your free trial ends on {when}. Your first charge of {} follows.",
            format_amount(local.amount_cents, &local.currency)
        ),
    )
    .await;

    Ok(())
}

/// invoice.payment_succeeded — the invoice does not carry period data, so
/// the live subscription is re-fetched from the provider. An amount that
/// differs from the stored expectation is logged as a warning and never
/// blocks the transition (billing drift is investigated out-of-band).
pub async fn on_invoice_payment_succeeded(
    pool: &PgPool,
    config: &StripeConfig,
    invoice: &stripe::Invoice,
) -> Result<(), ProcessError> {
    let Some(sub_ref) = invoice.subscription.as_ref() else {
        info!(invoice = %invoice.id, "Invoice without subscription, ignoring");
        return Ok(());
    };
    let stripe_id = sub_ref.id().to_string();

    let repo = SubscriptionsRepository::new(pool.clone());
    let local = repo
        .get_by_stripe_id(&stripe_id)
        .await?
        .ok_or_else(|| ProcessError::not_found("subscription", &stripe_id))?;

    if amount_mismatch(local.amount_cents, invoice.amount_paid) {
        metrics::counter!("stripe.webhook.amount_mismatch").increment(1);
        warn!(
            subscription_id = %local.id,
            expected_cents = local.amount_cents,
            paid_cents = ?invoice.amount_paid,
            "Invoice amount differs from expected subscription amount"
        );
    }

    let sub_id = stripe_id
        .parse::<stripe::SubscriptionId>()
        .map_err(|e| ProcessError::Other(anyhow!("invalid subscription id: {e}")))?;
    let live = stripe::Subscription::retrieve(&config.client, &sub_id, &[]).await?;

    let mut patch = ProviderSubscriptionState::from_stripe(&live).into_patch();
    // The paid invoice ends any trial regardless of what the live object says
    patch.trial_start = None;
    patch.trial_end = None;
    repo.apply_patch(local.id, patch).await?;

    Ok(())
}

/// invoice.payment_failed — status moves to the provider-reported value when
/// the event carries the expanded subscription, `past_due` otherwise.
pub async fn on_invoice_payment_failed(
    pool: &PgPool,
    invoice: &stripe::Invoice,
) -> Result<(), ProcessError> {
    let Some(sub_ref) = invoice.subscription.as_ref() else {
        info!(invoice = %invoice.id, "Invoice without subscription, ignoring");
        return Ok(());
    };
    let stripe_id = sub_ref.id().to_string();

    let repo = SubscriptionsRepository::new(pool.clone());
    let local = repo
        .get_by_stripe_id(&stripe_id)
        .await?
        .ok_or_else(|| ProcessError::not_found("subscription", &stripe_id))?;

    let status = match sub_ref {
        stripe::Expandable::Object(sub) => map_status(sub.status),
        stripe::Expandable::Id(_) => SubscriptionStatus::PastDue,
    };
    let updated = repo.update_status(local.id, status).await?;

    notifications::send(
        pool,
        updated.user_id,
        "Payment problem",
        "We could not collect your subscription payment. Please update your payment method.",
    )
    .await;

    Ok(())
}

/// customer.subscription.deleted — canceled, unconditionally
pub async fn on_subscription_deleted(
    pool: &PgPool,
    sub: &stripe::Subscription,
) -> Result<(), ProcessError> {
    let repo = SubscriptionsRepository::new(pool.clone());
    let stripe_id = sub.id.to_string();
    let local = repo
        .get_by_stripe_id(&stripe_id)
        .await?
        .ok_or_else(|| ProcessError::not_found("subscription", &stripe_id))?;

    repo.update_status(local.id, SubscriptionStatus::Canceled)
        .await?;
    Ok(())
}

/// Synchronous reconciliation for a client returning from checkout before
/// the webhook has necessarily arrived. Tolerates the webhook racing ahead:
/// an already active/trialing record is returned as-is. Otherwise resolves
/// the provider subscription (stored id, else via the checkout session) and
/// applies exactly the same patch the webhook path would.
pub async fn reconcile_with_provider(
    pool: &PgPool,
    config: &StripeConfig,
    local: Subscription,
    checkout_session_id: Option<&str>,
) -> Result<Subscription, ProcessError> {
    if matches!(
        local.status,
        SubscriptionStatus::Active | SubscriptionStatus::Trialing
    ) {
        return Ok(local);
    }

    let stripe_id = match &local.stripe_subscription_id {
        Some(id) => id.clone(),
        None => {
            let Some(session_id) = checkout_session_id else {
                return Err(ProcessError::Other(anyhow!(
                    "subscription {} has no provider id and no checkout session was given",
                    local.id
                )));
            };
            let session_id = session_id
                .parse::<stripe::CheckoutSessionId>()
                .map_err(|e| ProcessError::Other(anyhow!("invalid checkout session id: {e}")))?;
            let session =
                stripe::CheckoutSession::retrieve(&config.client, &session_id, &[]).await?;
            let Some(sub_ref) = session.subscription else {
                return Err(ProcessError::Other(anyhow!(
                    "checkout session {session_id} carries no subscription"
                )));
            };
            sub_ref.id().to_string()
        }
    };

    let sub_id = stripe_id
        .parse::<stripe::SubscriptionId>()
        .map_err(|e| ProcessError::Other(anyhow!("invalid subscription id: {e}")))?;
    let live = stripe::Subscription::retrieve(&config.client, &sub_id, &[]).await?;

    let repo = SubscriptionsRepository::new(pool.clone());
    let patch = ProviderSubscriptionState::from_stripe(&live).into_patch();
    let updated = repo.apply_patch(local.id, patch).await?;
    Ok(updated)
}
