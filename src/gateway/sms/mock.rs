use super::{DispatchOutcome, SmsGateway};
use crate::error::Result;
use crate::gateway::ApprovalPolicy;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Carrier stand-in for explicit mock mode; nothing leaves the process.
#[derive(Debug)]
pub struct MockSmsGateway {
    policy: ApprovalPolicy,
    failure_code: String,
    dispatched: AtomicUsize,
}

impl MockSmsGateway {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self {
            policy,
            failure_code: "isv.MOCK_REJECTED".to_string(),
            dispatched: AtomicUsize::new(0),
        }
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SmsGateway for MockSmsGateway {
    async fn dispatch(&self, recipient: &str, content: &str) -> Result<DispatchOutcome> {
        self.dispatched.fetch_add(1, Ordering::SeqCst);

        let outcome = if self.policy.approves() {
            DispatchOutcome::delivered(format!("mock_{}", Utc::now().timestamp()))
        } else {
            DispatchOutcome::rejected(
                "simulated carrier rejection",
                Some(self.failure_code.clone()),
            )
        };
        debug!(
            recipient,
            chars = content.chars().count(),
            success = outcome.success,
            "mock sms dispatch"
        );
        Ok(outcome)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_delivers() {
        let gateway = MockSmsGateway::new(ApprovalPolicy::Always);
        let outcome = gateway.dispatch("13800000000", "hello").await.unwrap();
        assert!(outcome.success);
        assert!(outcome.provider_message_id.unwrap().starts_with("mock_"));
        assert_eq!(gateway.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_rejects() {
        let gateway = MockSmsGateway::new(ApprovalPolicy::Never);
        let outcome = gateway.dispatch("13800000000", "hello").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error_code.as_deref(), Some("isv.MOCK_REJECTED"));
        assert!(outcome.error.is_some());
    }
}
