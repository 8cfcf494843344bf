use super::{ClientPayParams, PaymentGateway, PaymentOutcome};
use crate::domain::money::Money;
use crate::error::Result;
use crate::gateway::ApprovalPolicy;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Sandbox payment processor used when no merchant credentials are set.
///
/// Answers deterministically according to its policies and never touches the
/// network. `sandbox()` reproduces the production stand-in (2 s charge,
/// 1 s refund, 95 % approval); tests use `instant` with a fixed policy.
#[derive(Debug)]
pub struct MockPaymentGateway {
    charge_policy: ApprovalPolicy,
    refund_policy: ApprovalPolicy,
    charge_latency: Duration,
    refund_latency: Duration,
    charges: AtomicUsize,
    refunds: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn sandbox() -> Self {
        Self::instant(ApprovalPolicy::Rate(95))
            .with_latency(Duration::from_secs(2), Duration::from_secs(1))
    }

    pub fn instant(charge_policy: ApprovalPolicy) -> Self {
        Self {
            charge_policy,
            refund_policy: ApprovalPolicy::Always,
            charge_latency: Duration::ZERO,
            refund_latency: Duration::ZERO,
            charges: AtomicUsize::new(0),
            refunds: AtomicUsize::new(0),
        }
    }

    pub fn with_refund_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.refund_policy = policy;
        self
    }

    pub fn with_latency(mut self, charge: Duration, refund: Duration) -> Self {
        self.charge_latency = charge;
        self.refund_latency = refund;
        self
    }

    /// Number of charge calls received so far.
    pub fn charge_count(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    /// Number of refund calls received so far.
    pub fn refund_count(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, order_id: Uuid, amount: Money) -> Result<PaymentOutcome> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        if !self.charge_latency.is_zero() {
            tokio::time::sleep(self.charge_latency).await;
        }

        let outcome = if self.charge_policy.approves() {
            PaymentOutcome::approved(format!("wx_{}_{}", Utc::now().timestamp(), short_id()))
        } else {
            PaymentOutcome::declined("payment declined")
        };
        debug!(%order_id, %amount, success = outcome.success, "mock charge");
        Ok(outcome)
    }

    async fn refund(&self, order_id: Uuid, amount: Money, reason: &str) -> Result<PaymentOutcome> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        if !self.refund_latency.is_zero() {
            tokio::time::sleep(self.refund_latency).await;
        }

        let outcome = if self.refund_policy.approves() {
            PaymentOutcome::approved(format!(
                "refund_{}_{}",
                Utc::now().timestamp(),
                short_id()
            ))
        } else {
            PaymentOutcome::declined("refund declined")
        };
        debug!(%order_id, %amount, reason, success = outcome.success, "mock refund");
        Ok(outcome)
    }

    async fn client_params(&self, _order_id: Uuid, _amount: Money) -> Result<ClientPayParams> {
        let now = Utc::now().timestamp();
        Ok(ClientPayParams {
            app_id: "mock_app_id".to_string(),
            time_stamp: now.to_string(),
            nonce_str: nonce(),
            package: format!("prepay_id=wx{now}"),
            sign_type: "RSA".to_string(),
            pay_sign: "mock_pay_sign".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
