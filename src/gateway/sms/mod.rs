//! SMS delivery provider client.

pub mod http;
pub mod mock;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use http::HttpSmsGateway;
pub use mock::MockSmsGateway;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

impl DispatchOutcome {
    pub fn delivered(provider_message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_message_id: Some(provider_message_id.into()),
            error: None,
            error_code: None,
        }
    }

    pub fn rejected(error: impl Into<String>, error_code: Option<String>) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
            error_code,
        }
    }
}

/// Hands a message to the carrier. Single shot: no retry happens here, the
/// caller owns retry and compensation policy.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn dispatch(&self, recipient: &str, content: &str) -> Result<DispatchOutcome>;

    fn name(&self) -> &'static str;
}

pub type SmsGatewayRef = Arc<dyn SmsGateway>;
