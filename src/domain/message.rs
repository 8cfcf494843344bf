use super::money::Money;
use super::pricing;
use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmsProvider {
    #[default]
    Aliyun,
    Tencent,
    Huawei,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageTransition {
    Scheduled,
    Sending,
    Sent {
        provider_message_id: String,
        at: DateTime<Utc>,
    },
    Failed {
        reason: String,
    },
}

impl MessageTransition {
    pub fn target(&self) -> MessageStatus {
        match self {
            Self::Scheduled => MessageStatus::Scheduled,
            Self::Sending => MessageStatus::Sending,
            Self::Sent { .. } => MessageStatus::Sent,
            Self::Failed { .. } => MessageStatus::Failed,
        }
    }
}

/// One outbound SMS, tied to exactly one paid order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Message {
    pub id: Uuid,
    pub user_id: String,
    pub order_id: Uuid,
    pub recipient_phone: String,
    pub content: String,
    pub character_count: usize,
    /// Snapshot of the price computed when the order was opened.
    pub cost: Money,
    pub status: MessageStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
    pub provider: SmsProvider,
    pub provider_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        user_id: impl Into<String>,
        order_id: Uuid,
        recipient_phone: impl Into<String>,
        content: impl Into<String>,
        cost: Money,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            order_id,
            recipient_phone: recipient_phone.into(),
            character_count: pricing::char_count(&content),
            content,
            cost,
            status: MessageStatus::Pending,
            scheduled_at,
            sent_at: None,
            failed_reason: None,
            provider: SmsProvider::default(),
            provider_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        matches!(
            (self.status, next),
            (
                MessageStatus::Pending,
                MessageStatus::Sending | MessageStatus::Scheduled
            ) | (MessageStatus::Sending, MessageStatus::Sent | MessageStatus::Failed)
        )
    }

    pub fn apply(&mut self, transition: MessageTransition) -> Result<(), ServiceError> {
        let next = transition.target();
        if !self.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition {
                entity: "message",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        match transition {
            MessageTransition::Scheduled | MessageTransition::Sending => {}
            MessageTransition::Sent {
                provider_message_id,
                at,
            } => {
                self.provider_message_id = Some(provider_message_id);
                self.sent_at = Some(at);
            }
            MessageTransition::Failed { reason } => self.failed_reason = Some(reason),
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
