use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

/// Why webhook processing of one event failed. Anything escaping a handler
/// is caught at the endpoint, audited as `failed`, and surfaced as a 500 so
/// the provider's at-least-once delivery retries the whole event.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{kind} {id} not found")]
    RecordNotFound { kind: &'static str, id: String },
    #[error("stripe api error: {0}")]
    Stripe(#[from] stripe::StripeError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProcessError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        ProcessError::RecordNotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Payment purpose carried in checkout-session metadata, parsed once at the
/// router boundary. Checkout sessions from unrelated flows share the same
/// envelope, so an unclassifiable metadata bag is not an error: the caller
/// treats `None` as a logged no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscrowPurpose {
    ContestFunding {
        contest_id: Uuid,
    },
    OrderEscrow {
        order_id: Uuid,
    },
    VideoPurchase {
        video_id: Uuid,
        payment_id: Uuid,
        buyer_id: Uuid,
        creator_id: Uuid,
    },
    SubmissionApproval {
        submission_id: Uuid,
        project_id: Uuid,
        creator_id: Uuid,
    },
}

impl EscrowPurpose {
    /// Classify a metadata bag by its discriminating key. Returns `None`
    /// when no known key is present or a present key does not parse; both
    /// are logged and handled as unroutable upstream.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Option<Self> {
        if metadata.contains_key("contestId") {
            return Some(EscrowPurpose::ContestFunding {
                contest_id: uuid_field(metadata, "contestId")?,
            });
        }
        if metadata.contains_key("orderId") {
            return Some(EscrowPurpose::OrderEscrow {
                order_id: uuid_field(metadata, "orderId")?,
            });
        }
        if metadata.contains_key("videoId") {
            return Some(EscrowPurpose::VideoPurchase {
                video_id: uuid_field(metadata, "videoId")?,
                payment_id: uuid_field(metadata, "paymentId")?,
                buyer_id: uuid_field(metadata, "buyerId")?,
                creator_id: uuid_field(metadata, "creatorId")?,
            });
        }
        if metadata.contains_key("submissionId") {
            return Some(EscrowPurpose::SubmissionApproval {
                submission_id: uuid_field(metadata, "submissionId")?,
                project_id: uuid_field(metadata, "projectId")?,
                creator_id: uuid_field(metadata, "creatorId")?,
            });
        }
        None
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EscrowPurpose::ContestFunding { .. } => "contest_funding",
            EscrowPurpose::OrderEscrow { .. } => "order_escrow",
            EscrowPurpose::VideoPurchase { .. } => "video_purchase",
            EscrowPurpose::SubmissionApproval { .. } => "submission_approval",
        }
    }
}

fn uuid_field(metadata: &HashMap<String, String>, key: &str) -> Option<Uuid> {
    let raw = metadata.get(key)?;
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(key, value = %raw, "Metadata field is not a valid UUID");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn classifies_contest_funding() {
        let contest_id = Uuid::new_v4();
        let md = metadata(&[("contestId", &contest_id.to_string())]);
        assert_eq!(
            EscrowPurpose::from_metadata(&md),
            Some(EscrowPurpose::ContestFunding { contest_id })
        );
    }

    #[test]
    fn classifies_video_purchase_with_all_fields() {
        let video_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();
        let buyer_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();
        let md = metadata(&[
            ("videoId", &video_id.to_string()),
            ("paymentId", &payment_id.to_string()),
            ("buyerId", &buyer_id.to_string()),
            ("creatorId", &creator_id.to_string()),
        ]);
        assert_eq!(
            EscrowPurpose::from_metadata(&md),
            Some(EscrowPurpose::VideoPurchase {
                video_id,
                payment_id,
                buyer_id,
                creator_id
            })
        );
    }

    #[test]
    fn video_purchase_missing_payment_id_is_unroutable() {
        let md = metadata(&[
            ("videoId", &Uuid::new_v4().to_string()),
            ("buyerId", &Uuid::new_v4().to_string()),
            ("creatorId", &Uuid::new_v4().to_string()),
        ]);
        assert_eq!(EscrowPurpose::from_metadata(&md), None);
    }

    #[test]
    fn classifies_submission_approval() {
        let submission_id = Uuid::new_v4();
        let project_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();
        let md = metadata(&[
            ("submissionId", &submission_id.to_string()),
            ("projectId", &project_id.to_string()),
            ("creatorId", &creator_id.to_string()),
        ]);
        assert_eq!(
            EscrowPurpose::from_metadata(&md),
            Some(EscrowPurpose::SubmissionApproval {
                submission_id,
                project_id,
                creator_id
            })
        );
    }

    #[test]
    fn unknown_keys_are_unroutable() {
        let md = metadata(&[("somethingElse", "value")]);
        assert_eq!(EscrowPurpose::from_metadata(&md), None);
        assert_eq!(EscrowPurpose::from_metadata(&HashMap::new()), None);
    }

    #[test]
    fn malformed_uuid_is_unroutable() {
        let md = metadata(&[("orderId", "not-a-uuid")]);
        assert_eq!(EscrowPurpose::from_metadata(&md), None);
    }

    #[test]
    fn contest_key_wins_over_later_keys() {
        let contest_id = Uuid::new_v4();
        let md = metadata(&[
            ("contestId", &contest_id.to_string()),
            ("orderId", &Uuid::new_v4().to_string()),
        ]);
        assert_eq!(
            EscrowPurpose::from_metadata(&md),
            Some(EscrowPurpose::ContestFunding { contest_id })
        );
    }
}
