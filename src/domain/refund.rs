use super::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Success,
    Failed,
}

/// Compensation issued when a paid message could not be delivered.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct RefundRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub refund_amount: Money,
    pub reason: String,
    pub status: RefundStatus,
    pub refund_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl RefundRecord {
    /// A refund the provider has already confirmed.
    pub fn completed(
        order_id: Uuid,
        refund_amount: Money,
        reason: impl Into<String>,
        refund_transaction_id: impl Into<String>,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            refund_amount,
            reason: reason.into(),
            status: RefundStatus::Success,
            refund_transaction_id: Some(refund_transaction_id.into()),
            created_at: Utc::now(),
            processed_at: Some(processed_at),
        }
    }
}
