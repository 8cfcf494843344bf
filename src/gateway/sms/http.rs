use super::{DispatchOutcome, SmsGateway};
use crate::config::SmsCredentials;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Live carrier client.
///
/// Posts a templated send request to the SMS endpoint configured by
/// `SMS_GATEWAY_URL` using the access key pair as basic credentials. The
/// response follows the carrier convention: `code == "OK"` means accepted and
/// `biz_id` identifies the message.
#[derive(Debug, Clone)]
pub struct HttpSmsGateway {
    client: Client,
    base_url: String,
    access_key_id: String,
    access_key_secret: String,
    region: String,
    sign_name: String,
    template_code: String,
}

#[derive(Serialize)]
struct SendSmsRequest<'a> {
    phone_numbers: &'a str,
    sign_name: &'a str,
    template_code: &'a str,
    /// JSON encoded template variables.
    template_param: String,
    region: &'a str,
}

#[derive(Deserialize)]
struct SendSmsResponse {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    biz_id: Option<String>,
}

impl HttpSmsGateway {
    pub fn new(credentials: &SmsCredentials) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ServiceError::ConfigError(format!("sms client: {e}")))?;

        Ok(Self {
            client,
            base_url: credentials.gateway_url.trim_end_matches('/').to_string(),
            access_key_id: credentials.access_key_id.clone(),
            access_key_secret: credentials.access_key_secret.clone(),
            region: credentials.region.clone(),
            sign_name: credentials.sign_name.clone(),
            template_code: credentials.template_code.clone(),
        })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn dispatch(&self, recipient: &str, content: &str) -> Result<DispatchOutcome> {
        let url = format!("{}/v1/sms/send", self.base_url);
        let body = SendSmsRequest {
            phone_numbers: recipient,
            sign_name: &self.sign_name,
            template_code: &self.template_code,
            template_param: serde_json::json!({ "content": content }).to_string(),
            region: &self.region,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.access_key_id, Some(&self.access_key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::DeliveryError {
                reason: format!("request to {url} failed: {e}"),
                code: None,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ServiceError::DeliveryError {
            reason: format!("reading {url} response: {e}"),
            code: None,
        })?;
        debug!(%url, %status, "sms gateway responded");

        let Ok(parsed) = serde_json::from_str::<SendSmsResponse>(&text) else {
            warn!(%status, "unreadable sms gateway response");
            return Ok(DispatchOutcome::rejected(
                format!("HTTP {status}: {text}"),
                None,
            ));
        };

        if parsed.code == "OK" {
            match parsed.biz_id {
                Some(biz_id) => Ok(DispatchOutcome::delivered(biz_id)),
                None => Ok(DispatchOutcome::rejected(
                    "accepted without message id",
                    Some(parsed.code),
                )),
            }
        } else {
            Ok(DispatchOutcome::rejected(parsed.message, Some(parsed.code)))
        }
    }

    fn name(&self) -> &'static str {
        "aliyun"
    }
}
