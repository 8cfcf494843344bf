//! Payment provider client.

pub mod http;
pub mod mock;

use crate::domain::money::Money;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub use http::HttpPaymentGateway;
pub use mock::MockPaymentGateway;

/// Result of a charge or refund as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentOutcome {
    pub fn approved(transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            error: None,
        }
    }

    pub fn declined(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            error: Some(error.into()),
        }
    }

    /// The transaction id of a successful call, `None` otherwise.
    pub fn confirmed_transaction(&self) -> Option<&str> {
        if self.success {
            self.transaction_id.as_deref()
        } else {
            None
        }
    }

    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "unknown payment error".to_string())
    }
}

/// Parameters the client app needs to invoke the provider's pay sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPayParams {
    pub app_id: String,
    pub time_stamp: String,
    pub nonce_str: String,
    pub package: String,
    pub sign_type: String,
    pub pay_sign: String,
}

/// Submits charges and refunds to an external processor.
///
/// Refunds are not idempotent; callers must check the order status before
/// issuing one. Transport failures are `Err`, provider rejections are an
/// `Ok` outcome with `success == false`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, order_id: Uuid, amount: Money) -> Result<PaymentOutcome>;

    async fn refund(&self, order_id: Uuid, amount: Money, reason: &str) -> Result<PaymentOutcome>;

    async fn client_params(&self, order_id: Uuid, amount: Money) -> Result<ClientPayParams>;

    /// Short provider label for logs.
    fn name(&self) -> &'static str;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
