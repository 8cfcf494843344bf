#![allow(dead_code)]

use assert_cmd::cargo_bin;
use smsrelay::application::coordinator::{Coordinator, SendRequest};
use smsrelay::domain::ports::Stores;
use smsrelay::gateway::ApprovalPolicy;
use smsrelay::gateway::payment::MockPaymentGateway;
use smsrelay::gateway::sms::MockSmsGateway;
use smsrelay::infrastructure::in_memory::InMemoryStore;
use std::process::Command;
use std::sync::Arc;

/// A coordinator over in-memory storage and instant mock gateways, with the
/// gateways kept around for call-count assertions.
pub struct Harness {
    pub coordinator: Coordinator,
    pub payments: Arc<MockPaymentGateway>,
    pub sms: Arc<MockSmsGateway>,
}

pub fn harness(charge: ApprovalPolicy, refund: ApprovalPolicy, delivery: ApprovalPolicy) -> Harness {
    let payments = Arc::new(MockPaymentGateway::instant(charge).with_refund_policy(refund));
    let sms = Arc::new(MockSmsGateway::new(delivery));
    let coordinator = Coordinator::new(
        Stores::shared(InMemoryStore::new()),
        payments.clone(),
        sms.clone(),
    );
    Harness {
        coordinator,
        payments,
        sms,
    }
}

pub fn request(user: &str, content: &str) -> SendRequest {
    SendRequest {
        user_id: user.to_string(),
        recipient: "13800000000".to_string(),
        content: content.to_string(),
        scheduled_at: None,
    }
}

/// The binary with a deterministic sandbox and no live credentials.
pub fn smsrelay() -> Command {
    let mut cmd = Command::new(cargo_bin!("smsrelay"));
    for key in [
        "DB_PATH",
        "WECHAT_APP_ID",
        "WECHAT_MERCHANT_ID",
        "ALIYUN_ACCESS_KEY_ID",
        "ALIYUN_ACCESS_KEY_SECRET",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("SMS_MOCK", "true")
        .env("MOCK_PAYMENT_LATENCY_MS", "0")
        .env("MOCK_REFUND_LATENCY_MS", "0")
        .env("MOCK_PAYMENT_APPROVAL_RATE", "100")
        .env("MOCK_SMS_SUCCESS_RATE", "100")
        .env("RUST_LOG", "warn");
    cmd
}
