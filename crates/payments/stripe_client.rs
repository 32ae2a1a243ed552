use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{error, warn};

type HmacSha256 = Hmac<Sha256>;

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct StripeClientConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub webhook_tolerance: Duration,
}

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
    max_retries: u32,
    webhook_tolerance_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCharge {
    pub id: String,
    pub status: Option<String>,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing timestamp in stripe-signature")]
    MissingTimestamp,
    #[error("invalid timestamp in stripe-signature")]
    InvalidTimestamp,
    #[error("missing v1 in stripe-signature")]
    MissingSignature,
    #[error("stripe-signature timestamp is outside the tolerance window")]
    Expired,
    #[error("no v1 signature matches the payload")]
    Mismatch,
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl StripeClient {
    pub fn new(config: StripeClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            secret_key: config.secret_key,
            webhook_secret: config.webhook_secret,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            webhook_tolerance_secs: i64::try_from(config.webhook_tolerance.as_secs())
                .unwrap_or(i64::MAX),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    /// Sends the request built by `build`, retrying timeouts, connection errors, 429 and 5xx.
    async fn send_with_retry<F>(&self, context: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            let outcome = build().send().await;
            let retryable = match &outcome {
                Ok(resp) => is_retryable_status(resp.status()),
                Err(err) => err.is_timeout() || err.is_connect(),
            };

            if retryable && attempt < self.max_retries {
                attempt += 1;
                match &outcome {
                    Ok(resp) => warn!(
                        context = %context,
                        attempt,
                        status = %resp.status(),
                        "stripe: retrying request"
                    ),
                    Err(err) => warn!(
                        context = %context,
                        attempt,
                        transport_error = %err,
                        "stripe: retrying request"
                    ),
                }
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                continue;
            }

            return Self::ensure_success(outcome?, context).await;
        }
    }

    /// Creates a PaymentIntent. https://stripe.com/docs/api/payment_intents/create
    ///
    /// The same idempotency key is sent on every retry so Stripe never opens two intents for one order.
    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
        idempotency_key: &str,
    ) -> Result<StripePaymentIntent> {
        let mut body: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];

        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value.clone()));
        }

        let url = self.url("payment_intents");
        let resp = self
            .send_with_retry("create payment intent", || {
                self.http
                    .post(&url)
                    .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header("Idempotency-Key", idempotency_key)
                    .form(&body)
            })
            .await?;

        let intent: StripePaymentIntent = resp.json().await?;
        Ok(intent)
    }

    pub async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<StripePaymentIntent> {
        // https://stripe.com/docs/api/payment_intents/retrieve
        let url = self.url(&format!("payment_intents/{}", intent_id));
        let resp = self
            .send_with_retry("retrieve payment intent", || {
                self.http
                    .get(&url)
                    .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            })
            .await?;

        let intent: StripePaymentIntent = resp.json().await?;
        Ok(intent)
    }

    pub async fn cancel_payment_intent(&self, intent_id: &str) -> Result<()> {
        // https://stripe.com/docs/api/payment_intents/cancel
        let resp = self
            .http
            .post(self.url(&format!("payment_intents/{}/cancel", intent_id)))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await?;
        Self::ensure_success(resp, "cancel payment intent").await?;

        Ok(())
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> std::result::Result<(), SignatureError> {
        self.verify_webhook_signature_at(payload, signature_header, Utc::now().timestamp())
    }

    pub fn verify_webhook_signature_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> std::result::Result<(), SignatureError> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        if signatures.is_empty() {
            return Err(SignatureError::MissingSignature);
        }

        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        if now.saturating_sub(signed_at) > self.webhook_tolerance_secs {
            return Err(SignatureError::Expired);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = signatures
            .iter()
            .filter_map(|signature| hex::decode(signature).ok())
            .any(|provided| mac.clone().verify_slice(&provided).is_ok());

        if !matched {
            return Err(SignatureError::Mismatch);
        }

        Ok(())
    }
}
