use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        payment_providers::PaymentProvider, payment_statuses::PaymentStatus,
    },
    payments::{
        stripe_client::{StripeCharge, StripeClient, StripeEvent, StripePaymentIntent},
        stripe_events::{self, EventMapping, MetadataOrderId},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Provider-agnostic view of a verified webhook notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub event_id: Option<String>,
    pub event_type: String,
    pub provider: PaymentProvider,
    pub provider_txn_id: Option<String>,
    pub order_id: Uuid,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    /// The provider's `data.object`, kept for logging; never interpreted past normalization.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Event(NormalizedEvent),
    /// Validly signed, but not an event type reconciliation cares about.
    Ignored { event_type: String },
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),
    #[error("malformed webhook event: {0}")]
    Malformed(String),
    #[error("failed to resolve webhook event")]
    Lookup(#[source] anyhow::Error),
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: HashMap<String, String>,
        idempotency_key: &str,
    ) -> Result<PaymentIntent>;

    async fn cancel_intent(&self, intent_id: &str) -> Result<()>;

    async fn parse_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> std::result::Result<WebhookOutcome, WebhookError>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: HashMap<String, String>,
        idempotency_key: &str,
    ) -> Result<PaymentIntent> {
        let intent = self
            .create_payment_intent(amount_cents, currency, &metadata, idempotency_key)
            .await?;

        let client_secret = intent
            .client_secret
            .ok_or_else(|| anyhow::anyhow!("Stripe PaymentIntent client_secret is missing"))?;

        Ok(PaymentIntent {
            id: intent.id,
            client_secret,
        })
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<()> {
        self.cancel_payment_intent(intent_id).await
    }

    async fn parse_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> std::result::Result<WebhookOutcome, WebhookError> {
        self.verify_webhook_signature(payload, signature_header)
            .map_err(|err| WebhookError::InvalidSignature(err.to_string()))?;

        let event: StripeEvent = serde_json::from_slice(payload)
            .map_err(|err| WebhookError::Malformed(err.to_string()))?;

        self.normalize_event(event).await
    }
}

fn decode_object<T: serde::de::DeserializeOwned>(
    event: &StripeEvent,
) -> std::result::Result<T, WebhookError> {
    serde_json::from_value(event.data.object.clone()).map_err(|err| {
        WebhookError::Malformed(format!("{} data.object: {}", event.type_, err))
    })
}

fn require_order_id(
    found: MetadataOrderId,
    source: &str,
) -> std::result::Result<Option<Uuid>, WebhookError> {
    match found {
        MetadataOrderId::Found(order_id) => Ok(Some(order_id)),
        MetadataOrderId::Missing => Ok(None),
        MetadataOrderId::Invalid(value) => Err(WebhookError::Malformed(format!(
            "{source} metadata order_id is not a uuid: {value}"
        ))),
    }
}

impl StripeClient {
    async fn normalize_event(
        &self,
        event: StripeEvent,
    ) -> std::result::Result<WebhookOutcome, WebhookError> {
        let Some(mapping) = stripe_events::mapping_for(&event.type_) else {
            debug!(event_type = %event.type_, "payments: ignoring unhandled stripe event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.type_,
            });
        };

        let (status, order_id, provider_txn_id, failure_reason) = match mapping {
            EventMapping::PaymentIntent(status) => {
                let intent: StripePaymentIntent = decode_object(&event)?;
                let order_id = require_order_id(
                    stripe_events::order_id_from_metadata(&intent.metadata),
                    "payment_intent",
                )?
                .ok_or_else(|| {
                    WebhookError::Malformed(format!(
                        "payment_intent {} has no order_id metadata",
                        intent.id
                    ))
                })?;
                let failure_reason = match status {
                    PaymentStatus::Failed => intent
                        .last_payment_error
                        .and_then(|payment_error| payment_error.message),
                    _ => None,
                };
                (status, order_id, Some(intent.id), failure_reason)
            }
            EventMapping::Charge(_) | EventMapping::ChargeFromStatus => {
                let charge: StripeCharge = decode_object(&event)?;
                let status = match mapping {
                    EventMapping::Charge(status) => status,
                    _ => match charge.status.as_deref().and_then(stripe_events::charge_status) {
                        Some(status) => status,
                        None => {
                            debug!(
                                event_type = %event.type_,
                                charge_status = ?charge.status,
                                "payments: ignoring charge update without a mapped status"
                            );
                            return Ok(WebhookOutcome::Ignored {
                                event_type: event.type_,
                            });
                        }
                    },
                };
                let order_id = self.resolve_charge_order_id(&charge).await?;
                let failure_reason = match status {
                    PaymentStatus::Failed => charge.failure_message.clone(),
                    _ => None,
                };
                let provider_txn_id = charge.payment_intent.clone().or(Some(charge.id));
                (status, order_id, provider_txn_id, failure_reason)
            }
        };

        info!(
            event_id = ?event.id,
            event_type = %event.type_,
            %order_id,
            status = %status,
            "payments: stripe event verified"
        );

        Ok(WebhookOutcome::Event(NormalizedEvent {
            event_id: event.id,
            event_type: event.type_,
            provider: PaymentProvider::Stripe,
            provider_txn_id,
            order_id,
            status,
            failure_reason,
            raw: event.data.object,
        }))
    }

    /// Charges only carry our metadata when it was copied over; otherwise ask Stripe for the intent.
    async fn resolve_charge_order_id(
        &self,
        charge: &StripeCharge,
    ) -> std::result::Result<Uuid, WebhookError> {
        if let Some(order_id) =
            require_order_id(stripe_events::order_id_from_metadata(&charge.metadata), "charge")?
        {
            return Ok(order_id);
        }

        let intent_id = charge.payment_intent.as_deref().ok_or_else(|| {
            WebhookError::Malformed(format!(
                "charge {} has neither order_id metadata nor a payment_intent",
                charge.id
            ))
        })?;

        let intent = self
            .retrieve_payment_intent(intent_id)
            .await
            .map_err(WebhookError::Lookup)?;

        require_order_id(
            stripe_events::order_id_from_metadata(&intent.metadata),
            "payment_intent",
        )?
        .ok_or_else(|| {
            WebhookError::Malformed(format!(
                "payment_intent {} linked to charge {} has no order_id metadata",
                intent_id, charge.id
            ))
        })
    }
}
