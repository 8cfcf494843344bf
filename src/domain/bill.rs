use super::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BillKind {
    Payment,
    Refund,
    Consumption,
    Recharge,
}

impl fmt::Display for BillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Payment => "payment",
            Self::Refund => "refund",
            Self::Consumption => "consumption",
            Self::Recharge => "recharge",
        };
        f.write_str(s)
    }
}

/// Append-only ledger entry for a balance-affecting event.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Bill {
    pub id: Uuid,
    pub user_id: String,
    pub order_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: BillKind,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
