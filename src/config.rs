//! Environment driven configuration.
//!
//! Every value comes from the process environment (optionally seeded from a
//! `.env` file by the binary). Resolution goes through a lookup function so
//! tests can supply their own variables without touching the real
//! environment.
//!
//! The two providers differ when credentials are missing:
//! payments fall back to the sandbox processor, while SMS refuses to start
//! unless mock mode was requested explicitly.

use crate::error::{Result, ServiceError};
use crate::gateway::ApprovalPolicy;
use crate::gateway::payment::{
    HttpPaymentGateway, MockPaymentGateway, PaymentGatewayRef,
};
use crate::gateway::sms::{HttpSmsGateway, MockSmsGateway, SmsGatewayRef};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SMS_REGION: &str = "cn-hangzhou";
const DEFAULT_CHARGE_LATENCY_MS: u64 = 2000;
const DEFAULT_REFUND_LATENCY_MS: u64 = 1000;
const DEFAULT_APPROVAL_RATE: u8 = 95;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCredentials {
    pub app_id: String,
    pub merchant_id: String,
    pub merchant_key: String,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub gateway_url: String,
    pub notify_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPayment {
    pub charge_latency: Duration,
    pub refund_latency: Duration,
    /// Percentage of charges approved.
    pub approval_rate: u8,
}

impl Default for SandboxPayment {
    fn default() -> Self {
        Self {
            charge_latency: Duration::from_millis(DEFAULT_CHARGE_LATENCY_MS),
            refund_latency: Duration::from_millis(DEFAULT_REFUND_LATENCY_MS),
            approval_rate: DEFAULT_APPROVAL_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMode {
    Sandbox(SandboxPayment),
    Live(PaymentCredentials),
}

impl PaymentMode {
    pub fn build(&self) -> Result<PaymentGatewayRef> {
        Ok(match self {
            Self::Sandbox(settings) => Arc::new(
                MockPaymentGateway::instant(ApprovalPolicy::Rate(settings.approval_rate))
                    .with_latency(settings.charge_latency, settings.refund_latency),
            ),
            Self::Live(credentials) => Arc::new(HttpPaymentGateway::new(credentials)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub region: String,
    pub sign_name: String,
    pub template_code: String,
    pub gateway_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsMode {
    Mock { success_rate: u8 },
    Live(SmsCredentials),
}

impl SmsMode {
    pub fn build(&self) -> Result<SmsGatewayRef> {
        Ok(match self {
            Self::Mock { success_rate } => {
                Arc::new(MockSmsGateway::new(ApprovalPolicy::Rate(*success_rate)))
            }
            Self::Live(credentials) => Arc::new(HttpSmsGateway::new(credentials)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// RocksDB location; in-memory storage when absent.
    pub db_path: Option<PathBuf>,
    pub payment: PaymentMode,
    pub sms: SmsMode,
}

impl AppConfig {
    /// Reads the process environment.
    pub fn from_env(force_mock_sms: bool) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), force_mock_sms)
    }

    /// Resolves configuration through `env`; empty values count as unset.
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>, force_mock_sms: bool) -> Result<Self> {
        let get = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let payment = match (get("WECHAT_APP_ID"), get("WECHAT_MERCHANT_ID")) {
            (Some(app_id), Some(merchant_id)) => PaymentMode::Live(PaymentCredentials {
                app_id,
                merchant_id,
                merchant_key: require(&get, "WECHAT_MERCHANT_KEY")?,
                cert_path: get("WECHAT_CERT_PATH").map(PathBuf::from),
                key_path: get("WECHAT_KEY_PATH").map(PathBuf::from),
                gateway_url: require(&get, "PAYMENT_GATEWAY_URL")?,
                notify_url: get("PAYMENT_NOTIFY_URL"),
            }),
            _ => PaymentMode::Sandbox(SandboxPayment {
                charge_latency: parse_millis(&get, "MOCK_PAYMENT_LATENCY_MS", DEFAULT_CHARGE_LATENCY_MS)?,
                refund_latency: parse_millis(&get, "MOCK_REFUND_LATENCY_MS", DEFAULT_REFUND_LATENCY_MS)?,
                approval_rate: parse_rate(&get, "MOCK_PAYMENT_APPROVAL_RATE", DEFAULT_APPROVAL_RATE)?,
            }),
        };

        let mock_requested = force_mock_sms || get("SMS_MOCK").is_some_and(|v| is_truthy(&v));
        let sms = if mock_requested {
            SmsMode::Mock {
                success_rate: parse_rate(&get, "MOCK_SMS_SUCCESS_RATE", 100)?,
            }
        } else {
            match (get("ALIYUN_ACCESS_KEY_ID"), get("ALIYUN_ACCESS_KEY_SECRET")) {
                (Some(access_key_id), Some(access_key_secret)) => SmsMode::Live(SmsCredentials {
                    access_key_id,
                    access_key_secret,
                    region: get("ALIYUN_SMS_REGION")
                        .unwrap_or_else(|| DEFAULT_SMS_REGION.to_string()),
                    sign_name: get("ALIYUN_SMS_SIGN_NAME").unwrap_or_default(),
                    template_code: get("ALIYUN_SMS_TEMPLATE_CODE").unwrap_or_default(),
                    gateway_url: require(&get, "SMS_GATEWAY_URL")?,
                }),
                _ => {
                    return Err(ServiceError::ConfigError(
                        "SMS provider credentials incomplete (set ALIYUN_ACCESS_KEY_ID and \
                         ALIYUN_ACCESS_KEY_SECRET, or SMS_MOCK=true)"
                            .to_string(),
                    ));
                }
            }
        };

        Ok(Self {
            db_path: get("DB_PATH").map(PathBuf::from),
            payment,
            sms,
        })
    }
}

fn require(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    get(key).ok_or_else(|| ServiceError::ConfigError(format!("{key} must be set")))
}

fn parse_millis(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    let millis = match get(key) {
        Some(v) => v
            .parse()
            .map_err(|_| ServiceError::ConfigError(format!("{key}: expected milliseconds, got {v}")))?,
        None => default,
    };
    Ok(Duration::from_millis(millis))
}

fn parse_rate(get: &impl Fn(&str) -> Option<String>, key: &str, default: u8) -> Result<u8> {
    match get(key) {
        Some(v) => match v.parse::<u8>() {
            Ok(rate) if rate <= 100 => Ok(rate),
            _ => Err(ServiceError::ConfigError(format!(
                "{key}: expected a percentage between 0 and 100, got {v}"
            ))),
        },
        None => Ok(default),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
