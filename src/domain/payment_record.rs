use super::money::Money;
use super::order::PaymentMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Success,
    Failed,
}

/// Raw audit entry written once per charge attempt.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub amount: Money,
    pub status: PaymentRecordStatus,
    /// Provider response as received, kept for reconciliation.
    pub callback_data: String,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(
        order_id: Uuid,
        payment_method: PaymentMethod,
        amount: Money,
        transaction_id: Option<String>,
        callback_data: String,
    ) -> Self {
        let status = if transaction_id.is_some() {
            PaymentRecordStatus::Success
        } else {
            PaymentRecordStatus::Failed
        };
        Self {
            id: Uuid::new_v4(),
            order_id,
            payment_method,
            transaction_id,
            amount,
            status,
            callback_data,
            created_at: Utc::now(),
        }
    }
}
