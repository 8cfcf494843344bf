use super::{ClientPayParams, PaymentGateway, PaymentOutcome};
use crate::config::PaymentCredentials;
use crate::domain::money::Money;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use reqwest::{Client, Identity, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

const CURRENCY: &str = "CNY";
const ORDER_DESCRIPTION: &str = "Anonymous SMS service";

/// Live payment processor reached over HTTPS.
///
/// Talks JSON to the merchant payment endpoint configured by
/// `PAYMENT_GATEWAY_URL`, authenticating with the merchant key as a bearer
/// token and, when both paths are configured, a client certificate.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    app_id: String,
    merchant_id: String,
    merchant_key: String,
    notify_url: Option<String>,
}

#[derive(Serialize)]
struct ChargeRequest<'a> {
    app_id: &'a str,
    merchant_id: &'a str,
    out_trade_no: String,
    amount: i64,
    currency: &'static str,
}

#[derive(Serialize)]
struct RefundRequest<'a> {
    merchant_id: &'a str,
    out_trade_no: String,
    amount: i64,
    currency: &'static str,
    reason: &'a str,
}

#[derive(Serialize)]
struct PrepayRequest<'a> {
    app_id: &'a str,
    merchant_id: &'a str,
    description: &'static str,
    out_trade_no: String,
    amount: i64,
    currency: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notify_url: Option<&'a str>,
}

impl HttpPaymentGateway {
    pub fn new(credentials: &PaymentCredentials) -> Result<Self> {
        let mut builder = Client::builder();

        if let (Some(cert_path), Some(key_path)) = (&credentials.cert_path, &credentials.key_path)
        {
            let mut pem = std::fs::read(cert_path)?;
            pem.push(b'\n');
            pem.extend(std::fs::read(key_path)?);
            let identity = Identity::from_pem(&pem).map_err(|e| {
                ServiceError::ConfigError(format!("invalid merchant certificate: {e}"))
            })?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| ServiceError::ConfigError(format!("payment client: {e}")))?;

        Ok(Self {
            client,
            base_url: credentials.gateway_url.trim_end_matches('/').to_string(),
            app_id: credentials.app_id.clone(),
            merchant_id: credentials.merchant_id.clone(),
            merchant_key: credentials.merchant_key.clone(),
            notify_url: credentials.notify_url.clone(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<(StatusCode, Option<R>, String)>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.merchant_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentError(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::PaymentError(format!("reading {url} response: {e}")))?;
        let parsed = serde_json::from_str(&text).ok();
        debug!(%url, %status, "payment gateway responded");
        Ok((status, parsed, text))
    }

    /// Maps a charge/refund response to an outcome; anything unreadable or
    /// non-2xx is a decline carrying the raw body.
    async fn submit<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<PaymentOutcome> {
        let (status, parsed, text) = self.post::<B, PaymentOutcome>(path, body).await?;
        match parsed {
            Some(outcome) if status.is_success() => Ok(outcome),
            _ => {
                warn!(path, %status, "payment gateway rejected request");
                Ok(PaymentOutcome::declined(format!("HTTP {status}: {text}")))
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn charge(&self, order_id: Uuid, amount: Money) -> Result<PaymentOutcome> {
        let body = ChargeRequest {
            app_id: &self.app_id,
            merchant_id: &self.merchant_id,
            out_trade_no: order_id.to_string(),
            amount: amount.to_minor_units(),
            currency: CURRENCY,
        };
        self.submit("/v1/charges", &body).await
    }

    async fn refund(&self, order_id: Uuid, amount: Money, reason: &str) -> Result<PaymentOutcome> {
        let body = RefundRequest {
            merchant_id: &self.merchant_id,
            out_trade_no: order_id.to_string(),
            amount: amount.to_minor_units(),
            currency: CURRENCY,
            reason,
        };
        self.submit("/v1/refunds", &body).await
    }

    async fn client_params(&self, order_id: Uuid, amount: Money) -> Result<ClientPayParams> {
        let body = PrepayRequest {
            app_id: &self.app_id,
            merchant_id: &self.merchant_id,
            description: ORDER_DESCRIPTION,
            out_trade_no: order_id.to_string(),
            amount: amount.to_minor_units(),
            currency: CURRENCY,
            notify_url: self.notify_url.as_deref(),
        };
        let (status, parsed, text) = self
            .post::<_, ClientPayParams>("/v1/prepay", &body)
            .await?;
        match parsed {
            Some(params) if status.is_success() => Ok(params),
            _ => Err(ServiceError::PaymentError(format!(
                "prepay failed with HTTP {status}: {text}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "wechat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn credentials(url: String) -> PaymentCredentials {
        PaymentCredentials {
            app_id: "wx_app".to_string(),
            merchant_id: "1900000001".to_string(),
            merchant_key: "secret-key".to_string(),
            cert_path: None,
            key_path: None,
            gateway_url: url,
            notify_url: None,
        }
    }

    #[tokio::test]
    async fn test_charge_success() {
        let mut server = mockito::Server::new_async().await;
        let order_id = Uuid::new_v4();
        let mock = server
            .mock("POST", "/v1/charges")
            .match_header("authorization", "Bearer secret-key")
            .match_body(Matcher::PartialJson(json!({
                "merchant_id": "1900000001",
                "out_trade_no": order_id.to_string(),
                "amount": 200,
                "currency": "CNY"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"transaction_id":"4200001"}"#)
            .create_async()
            .await;

        let gateway = HttpPaymentGateway::new(&credentials(server.url())).unwrap();
        let outcome = gateway
            .charge(order_id, Money::new(dec!(2.00)).unwrap())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(outcome, PaymentOutcome::approved("4200001"));
    }

    #[tokio::test]
    async fn test_refund_http_error_is_a_decline() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/refunds")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let gateway = HttpPaymentGateway::new(&credentials(server.url())).unwrap();
        let outcome = gateway
            .refund(Uuid::new_v4(), Money::new(dec!(1.00)).unwrap(), "delivery failed")
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error_message().contains("503"));
    }

    #[tokio::test]
    async fn test_client_params_parsed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/prepay")
            .with_status(200)
            .with_body(
                r#"{"appId":"wx_app","timeStamp":"1700000000","nonceStr":"abc",
                    "package":"prepay_id=wx123","signType":"RSA","paySign":"sig"}"#,
            )
            .create_async()
            .await;

        let gateway = HttpPaymentGateway::new(&credentials(server.url())).unwrap();
        let params = gateway
            .client_params(Uuid::new_v4(), Money::new(dec!(1.00)).unwrap())
            .await
            .unwrap();
        assert_eq!(params.package, "prepay_id=wx123");
        assert_eq!(params.pay_sign, "sig");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_an_error() {
        let gateway = HttpPaymentGateway::new(&credentials("http://127.0.0.1:1".to_string())).unwrap();
        let result = gateway
            .charge(Uuid::new_v4(), Money::new(dec!(1.00)).unwrap())
            .await;
        assert!(matches!(result, Err(ServiceError::PaymentError(_))));
    }
}
