use super::money::Money;
use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states accept no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Refunded | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Wechat,
    Alipay,
    Balance,
}

/// A status change together with the fields it stamps.
///
/// Each variant carries its whole payload so a store can apply it as one
/// unit; two concurrent transitions never interleave their fields.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderTransition {
    Paid {
        transaction_id: String,
        at: DateTime<Utc>,
    },
    Failed,
    Refunded {
        at: DateTime<Utc>,
    },
    Cancelled {
        at: DateTime<Utc>,
    },
}

impl OrderTransition {
    pub fn target(&self) -> OrderStatus {
        match self {
            Self::Paid { .. } => OrderStatus::Paid,
            Self::Failed => OrderStatus::Failed,
            Self::Refunded { .. } => OrderStatus::Refunded,
            Self::Cancelled { .. } => OrderStatus::Cancelled,
        }
    }
}

/// Any change an order store may apply atomically.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderUpdate {
    Transition(OrderTransition),
    LinkMessage(Uuid),
}

impl From<OrderTransition> for OrderUpdate {
    fn from(transition: OrderTransition) -> Self {
        Self::Transition(transition)
    }
}

/// A billable unit of work.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    /// Human readable, unique order number.
    pub order_no: String,
    pub amount: Money,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_transaction_id: Option<String>,
    pub description: String,
    pub message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(user_id: impl Into<String>, amount: Money, description: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            order_no: generate_order_no(created_at),
            amount,
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::default(),
            payment_transaction_id: None,
            description: description.into(),
            message_id: None,
            created_at,
            paid_at: None,
            refunded_at: None,
            cancelled_at: None,
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        matches!(
            (self.status, next),
            (
                OrderStatus::Pending,
                OrderStatus::Paid | OrderStatus::Failed | OrderStatus::Cancelled
            ) | (OrderStatus::Paid, OrderStatus::Refunded)
        )
    }

    /// Applies `transition` in place. The order is left untouched when the
    /// move is illegal.
    pub fn apply(&mut self, transition: OrderTransition) -> Result<(), ServiceError> {
        let next = transition.target();
        if !self.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition {
                entity: "order",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        match transition {
            OrderTransition::Paid { transaction_id, at } => {
                self.payment_transaction_id = Some(transaction_id);
                self.paid_at = Some(at);
            }
            OrderTransition::Failed => {}
            OrderTransition::Refunded { at } => self.refunded_at = Some(at),
            OrderTransition::Cancelled { at } => self.cancelled_at = Some(at),
        }
        self.status = next;
        Ok(())
    }

    pub fn update(&mut self, change: OrderUpdate) -> Result<(), ServiceError> {
        match change {
            OrderUpdate::Transition(transition) => self.apply(transition),
            OrderUpdate::LinkMessage(message_id) => {
                self.message_id = Some(message_id);
                Ok(())
            }
        }
    }
}

/// `XT` + UTC timestamp + 8 random hex digits, e.g. `XT20240101120000A1B2C3D4`.
fn generate_order_no(at: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("XT{}{:08X}", at.format("%Y%m%d%H%M%S"), suffix)
}
