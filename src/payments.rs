use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, TS)]
#[db_enum(existing_type_path = "crate::schema::sql_types::PaymentPurpose")]
#[ts(export, export_to = "../web/src/lib/types/generated/")]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    #[db_enum(rename = "contest_funding")]
    ContestFunding,
    #[db_enum(rename = "order_escrow")]
    OrderEscrow,
    #[db_enum(rename = "video_purchase")]
    VideoPurchase,
    #[db_enum(rename = "submission_approval")]
    SubmissionApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, TS)]
#[db_enum(existing_type_path = "crate::schema::sql_types::EscrowStatus")]
#[ts(export, export_to = "../web/src/lib/types/generated/")]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    #[db_enum(rename = "pending")]
    Pending,
    #[db_enum(rename = "paid_to_platform")]
    PaidToPlatform,
    #[db_enum(rename = "held_in_escrow")]
    HeldInEscrow,
    #[db_enum(rename = "active")]
    Active,
    #[db_enum(rename = "approved")]
    Approved,
    #[db_enum(rename = "payment_failed")]
    PaymentFailed,
    #[db_enum(rename = "checkout_expired")]
    CheckoutExpired,
}

impl EscrowStatus {
    /// Whether a record in `self` may move to `next`. Transitions are
    /// one-directional: nothing ever returns to `pending`, and `approved`,
    /// `payment_failed` and `checkout_expired` are terminal. Funded states
    /// may still fail afterwards (delayed ACH-style failures).
    pub fn can_transition_to(self, next: EscrowStatus) -> bool {
        use EscrowStatus::*;
        match self {
            Pending => next != Pending,
            PaidToPlatform | HeldInEscrow | Active => {
                matches!(next, Approved | PaymentFailed | CheckoutExpired)
            }
            Approved | PaymentFailed | CheckoutExpired => false,
        }
    }
}

/// Diesel model for the payments table
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Payment {
    pub id: Uuid,
    pub purpose: PaymentPurpose,
    pub status: EscrowStatus,
    pub amount_cents: i32,
    pub currency: String,
    pub stripe_checkout_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub buyer_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub video_id: Option<Uuid>,
    pub contest_id: Option<Uuid>,
    pub submission_id: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for new payments (created by the checkout-creation flow)
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPayment {
    pub id: Uuid,
    pub purpose: PaymentPurpose,
    pub status: EscrowStatus,
    pub amount_cents: i32,
    pub currency: String,
    pub stripe_checkout_session_id: Option<String>,
    pub buyer_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub video_id: Option<Uuid>,
    pub contest_id: Option<Uuid>,
    pub submission_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::EscrowStatus::*;

    #[test]
    fn pending_can_fund_approve_fail_or_expire() {
        assert!(Pending.can_transition_to(PaidToPlatform));
        assert!(Pending.can_transition_to(HeldInEscrow));
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(PaymentFailed));
        assert!(Pending.can_transition_to(CheckoutExpired));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn funded_states_approve_or_fail_but_never_revert() {
        for s in [PaidToPlatform, HeldInEscrow, Active] {
            assert!(s.can_transition_to(Approved));
            assert!(s.can_transition_to(PaymentFailed));
            assert!(s.can_transition_to(CheckoutExpired));
            assert!(!s.can_transition_to(Pending));
            assert!(!s.can_transition_to(Active));
        }
    }

    #[test]
    fn terminal_states_are_terminal() {
        for s in [Approved, PaymentFailed, CheckoutExpired] {
            for t in [
                Pending,
                PaidToPlatform,
                HeldInEscrow,
                Active,
                Approved,
                PaymentFailed,
                CheckoutExpired,
            ] {
                assert!(!s.can_transition_to(t));
            }
        }
    }
}
