use std::sync::Arc;

use async_trait::async_trait;
use storefront_core::{
    domain::{
        entities::payments::PaymentEntity,
        repositories::payments::PaymentRepository,
        value_objects::{
            enums::{
                order_statuses::OrderStatus, payment_providers::PaymentProvider,
                payment_statuses::PaymentStatus,
            },
            payments::PaymentModel,
        },
    },
    payments::gateway::{NormalizedEvent, PaymentGateway, WebhookError, WebhookOutcome},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::orders::OrderError;

/// The slice of the order workflow that payment reconciliation needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderProvider: Send + Sync {
    async fn find_order_owner(&self, order_id: Uuid) -> Result<Option<Uuid>, OrderError>;
    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), OrderError>;
}

/// Order status implied by a settled payment status. Statuses without an entry leave the order as is.
const ORDER_STATUS_BY_PAYMENT_STATUS: &[(PaymentStatus, OrderStatus)] =
    &[(PaymentStatus::Success, OrderStatus::Paid)];

pub fn order_status_for(status: PaymentStatus) -> Option<OrderStatus> {
    ORDER_STATUS_BY_PAYMENT_STATUS
        .iter()
        .find(|(payment_status, _)| *payment_status == status)
        .map(|(_, order_status)| *order_status)
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("unknown payment provider: {0}")]
    UnknownProvider(String),
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error("payment not found for order {0}")]
    PaymentNotFound(Uuid),
    #[error("order not found: {0}")]
    OrderNotFound(Uuid),
    #[error("payment belongs to another user")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentError::UnknownProvider(_) | PaymentError::InvalidWebhook(_) => {
                StatusCode::BAD_REQUEST
            }
            PaymentError::PaymentNotFound(_) | PaymentError::OrderNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            PaymentError::Forbidden => StatusCode::FORBIDDEN,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentError>;

const MAX_STATUS_ATTEMPTS: usize = 3;

/// What a webhook delivery did. Every variant is a success for the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResult {
    /// Payment moved to the event's status and the order mapping was applied.
    Reconciled,
    /// Payment already had the event's status; the order mapping was re-applied.
    AlreadyApplied,
    /// The payment has moved past this event; nothing changed.
    Stale,
    /// Event type or status that needs no reconciliation.
    Skipped,
}

pub struct PaymentUseCase<Pay, Ord, G>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Ord: OrderProvider + 'static,
    G: PaymentGateway + 'static,
{
    payment_repo: Arc<Pay>,
    order_provider: Arc<Ord>,
    payment_gateway: Arc<G>,
}

impl<Pay, Ord, G> PaymentUseCase<Pay, Ord, G>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Ord: OrderProvider + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(payment_repo: Arc<Pay>, order_provider: Arc<Ord>, payment_gateway: Arc<G>) -> Self {
        Self {
            payment_repo,
            order_provider,
            payment_gateway,
        }
    }

    pub async fn get_payment_by_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> UseCaseResult<PaymentModel> {
        let owner = self
            .order_provider
            .find_order_owner(order_id)
            .await
            .map_err(|err| match err {
                OrderError::Internal(err) => PaymentError::Internal(err),
                other => PaymentError::Internal(anyhow::Error::new(other)),
            })?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        if !is_admin && owner != user_id {
            warn!(%order_id, %user_id, "payments: access to foreign payment denied");
            return Err(PaymentError::Forbidden);
        }

        let payment = self
            .payment_repo
            .find_by_order_id(order_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(order_id))?;

        Ok(PaymentModel::from(payment))
    }

    /// Verifies and applies one provider notification. Safe to call repeatedly with the same delivery.
    pub async fn handle_webhook(
        &self,
        provider: &str,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<WebhookResult> {
        let expected = self.payment_gateway.provider();
        match PaymentProvider::from_path(provider) {
            Some(resolved) if resolved == expected => {}
            _ => {
                let err = PaymentError::UnknownProvider(provider.to_string());
                warn!(
                    provider,
                    status = err.status_code().as_u16(),
                    "payments: webhook for unknown provider"
                );
                return Err(err);
            }
        }

        let outcome = self
            .payment_gateway
            .parse_webhook(payload, signature)
            .await
            .map_err(|err| {
                match &err {
                    WebhookError::Lookup(source) => error!(
                        provider,
                        gateway_error = ?source,
                        "payments: failed to resolve webhook event"
                    ),
                    _ => warn!(
                        provider,
                        error = %err,
                        "payments: webhook verification failed"
                    ),
                }
                match err {
                    WebhookError::Lookup(source) => PaymentError::Internal(source),
                    other => PaymentError::InvalidWebhook(other.to_string()),
                }
            })?;

        let event = match outcome {
            WebhookOutcome::Event(event) => event,
            WebhookOutcome::Ignored { event_type } => {
                debug!(provider, %event_type, "payments: webhook event ignored");
                return Ok(WebhookResult::Skipped);
            }
        };

        if event.status == PaymentStatus::Initiated {
            debug!(
                order_id = %event.order_id,
                event_type = %event.event_type,
                "payments: payment already initiated at checkout"
            );
            return Ok(WebhookResult::Skipped);
        }

        self.reconcile(event).await
    }

    async fn reconcile(&self, event: NormalizedEvent) -> UseCaseResult<WebhookResult> {
        let order_id = event.order_id;

        let payment = self
            .payment_repo
            .find_by_order_id(order_id)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "payments: failed to load payment");
                PaymentError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(
                    %order_id,
                    event_id = ?event.event_id,
                    "payments: webhook for an order without payment"
                );
                PaymentError::PaymentNotFound(order_id)
            })?;

        let result = match self.apply_payment_status(&payment, &event).await? {
            Some(result) => result,
            None => return Ok(WebhookResult::Stale),
        };

        self.apply_order_status(&event).await?;

        info!(
            %order_id,
            payment_id = %payment.id,
            event_id = ?event.event_id,
            status = %event.status,
            ?result,
            "payments: webhook reconciled"
        );

        Ok(result)
    }

    /// `None` when the event is stale for this payment. A lost compare-and-swap is
    /// re-evaluated against the row that won.
    async fn apply_payment_status(
        &self,
        payment: &PaymentEntity,
        event: &NormalizedEvent,
    ) -> UseCaseResult<Option<WebhookResult>> {
        let mut payment = payment.clone();

        for _ in 0..MAX_STATUS_ATTEMPTS {
            let current = PaymentStatus::from_str(&payment.status).ok_or_else(|| {
                PaymentError::Internal(anyhow::anyhow!(
                    "payment {} has unknown status {}",
                    payment.id,
                    payment.status
                ))
            })?;

            if current == event.status {
                debug!(
                    payment_id = %payment.id,
                    status = %current,
                    "payments: duplicate webhook delivery"
                );
                return Ok(Some(WebhookResult::AlreadyApplied));
            }

            if !current.can_transition_to(event.status) {
                warn!(
                    payment_id = %payment.id,
                    from = %current,
                    to = %event.status,
                    event_id = ?event.event_id,
                    "payments: ignoring stale webhook event"
                );
                return Ok(None);
            }

            let updated = self
                .payment_repo
                .update_status(
                    payment.id,
                    vec![current],
                    event.status,
                    event.failure_reason.clone(),
                )
                .await
                .map_err(|err| {
                    error!(
                        payment_id = %payment.id,
                        db_error = ?err,
                        "payments: failed to update payment status"
                    );
                    PaymentError::Internal(err)
                })?;

            if updated.is_some() {
                return Ok(Some(WebhookResult::Reconciled));
            }

            debug!(
                payment_id = %payment.id,
                expected = %current,
                "payments: payment status changed concurrently, re-reading"
            );
            payment = self
                .payment_repo
                .find_by_order_id(event.order_id)
                .await?
                .ok_or(PaymentError::PaymentNotFound(event.order_id))?;
        }

        Err(PaymentError::Internal(anyhow::anyhow!(
            "payment {} kept changing while applying {}",
            payment.id,
            event.status
        )))
    }

    async fn apply_order_status(&self, event: &NormalizedEvent) -> UseCaseResult<()> {
        let order_id = event.order_id;
        let Some(order_status) = order_status_for(event.status) else {
            return Ok(());
        };

        match self
            .order_provider
            .update_order_status(order_id, order_status)
            .await
        {
            Ok(()) => Ok(()),
            Err(OrderError::InvalidTransition { from, to }) => {
                // Not retryable: the order was moved elsewhere (e.g. cancelled by an admin).
                warn!(
                    %order_id,
                    %from,
                    %to,
                    event_id = ?event.event_id,
                    "payments: order cannot follow payment status"
                );
                Ok(())
            }
            Err(OrderError::OrderNotFound) => Err(PaymentError::OrderNotFound(order_id)),
            Err(err) => {
                error!(
                    %order_id,
                    error = ?err,
                    "payments: failed to update order status"
                );
                Err(PaymentError::Internal(anyhow::Error::new(err)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockall::{Sequence, predicate::eq};
    use storefront_core::{
        domain::repositories::payments::MockPaymentRepository,
        payments::gateway::MockPaymentGateway,
    };

    fn payment(order_id: Uuid, status: PaymentStatus) -> PaymentEntity {
        let now = Utc::now();
        PaymentEntity {
            id: Uuid::new_v4(),
            order_id,
            provider: "STRIPE".to_string(),
            provider_txn_id: Some("pi_123".to_string()),
            amount_cents: 6000,
            currency: "USD".to_string(),
            payment_method: "STRIPE".to_string(),
            status: status.to_string(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn event(order_id: Uuid, status: PaymentStatus) -> NormalizedEvent {
        NormalizedEvent {
            event_id: Some("evt_1".to_string()),
            event_type: "payment_intent.succeeded".to_string(),
            provider: PaymentProvider::Stripe,
            provider_txn_id: Some("pi_123".to_string()),
            order_id,
            status,
            failure_reason: None,
            raw: serde_json::json!({}),
        }
    }

    fn gateway_emitting(outcome: WebhookOutcome) -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_provider().return_const(PaymentProvider::Stripe);
        gateway
            .expect_parse_webhook()
            .returning(move |_, _| Ok(outcome.clone()));
        gateway
    }

    #[test]
    fn only_success_moves_the_order() {
        assert_eq!(order_status_for(PaymentStatus::Success), Some(OrderStatus::Paid));
        assert_eq!(order_status_for(PaymentStatus::Failed), None);
        assert_eq!(order_status_for(PaymentStatus::Refunded), None);
        assert_eq!(order_status_for(PaymentStatus::Initiated), None);
    }

    #[tokio::test]
    async fn success_event_marks_payment_and_order_paid() {
        let order_id = Uuid::new_v4();
        let stored = payment(order_id, PaymentStatus::Initiated);
        let payment_id = stored.id;

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_by_order_id()
            .with(eq(order_id))
            .times(1)
            .returning(move |_| {
                let stored = stored.clone();
                Box::pin(async move { Ok(Some(stored)) })
            });
        payment_repo
            .expect_update_status()
            .with(
                eq(payment_id),
                eq(vec![PaymentStatus::Initiated]),
                eq(PaymentStatus::Success),
                eq(None),
            )
            .times(1)
            .returning(move |_, _, status, _| {
                let mut updated = payment(order_id, status);
                updated.id = payment_id;
                Box::pin(async move { Ok(Some(updated)) })
            });

        let mut order_provider = MockOrderProvider::new();
        order_provider
            .expect_update_order_status()
            .with(eq(order_id), eq(OrderStatus::Paid))
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                order_id,
                PaymentStatus::Success,
            )))),
        );

        let result = usecase
            .handle_webhook("stripe", b"{}", "t=1,v1=00")
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Reconciled);
    }

    #[tokio::test]
    async fn failed_event_updates_payment_but_not_order() {
        let order_id = Uuid::new_v4();
        let stored = payment(order_id, PaymentStatus::Initiated);

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_order_id().returning(move |_| {
            let stored = stored.clone();
            Box::pin(async move { Ok(Some(stored)) })
        });
        payment_repo
            .expect_update_status()
            .withf(|_, from, status, reason| {
                from == &vec![PaymentStatus::Initiated]
                    && *status == PaymentStatus::Failed
                    && reason.as_deref() == Some("card_declined")
            })
            .times(1)
            .returning(move |_, _, status, _| {
                let updated = payment(order_id, status);
                Box::pin(async move { Ok(Some(updated)) })
            });

        let mut order_provider = MockOrderProvider::new();
        order_provider.expect_update_order_status().never();

        let mut failed = event(order_id, PaymentStatus::Failed);
        failed.failure_reason = Some("card_declined".to_string());

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(failed))),
        );

        let result = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Reconciled);
    }

    #[tokio::test]
    async fn duplicate_delivery_skips_payment_write_and_reapplies_order_status() {
        let order_id = Uuid::new_v4();
        let stored = payment(order_id, PaymentStatus::Success);

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_order_id().returning(move |_| {
            let stored = stored.clone();
            Box::pin(async move { Ok(Some(stored)) })
        });
        payment_repo.expect_update_status().never();

        let mut order_provider = MockOrderProvider::new();
        order_provider
            .expect_update_order_status()
            .with(eq(order_id), eq(OrderStatus::Paid))
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                order_id,
                PaymentStatus::Success,
            )))),
        );

        let result = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::AlreadyApplied);
    }

    #[tokio::test]
    async fn stale_event_changes_nothing() {
        let order_id = Uuid::new_v4();
        let stored = payment(order_id, PaymentStatus::Refunded);

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_order_id().returning(move |_| {
            let stored = stored.clone();
            Box::pin(async move { Ok(Some(stored)) })
        });
        payment_repo.expect_update_status().never();

        let mut order_provider = MockOrderProvider::new();
        order_provider.expect_update_order_status().never();

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                order_id,
                PaymentStatus::Success,
            )))),
        );

        let result = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Stale);
    }

    fn stored_payment_sequence(
        payment_repo: &mut MockPaymentRepository,
        seq: &mut Sequence,
        order_id: Uuid,
        payment_id: Uuid,
        statuses: Vec<PaymentStatus>,
    ) {
        for status in statuses {
            payment_repo
                .expect_find_by_order_id()
                .with(eq(order_id))
                .times(1)
                .in_sequence(seq)
                .returning(move |_| {
                    let mut stored = payment(order_id, status);
                    stored.id = payment_id;
                    Box::pin(async move { Ok(Some(stored)) })
                });
        }
    }

    #[tokio::test]
    async fn success_after_declined_attempt_pays_the_order() {
        let order_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();

        let mut seq = Sequence::new();
        let mut payment_repo = MockPaymentRepository::new();
        stored_payment_sequence(
            &mut payment_repo,
            &mut seq,
            order_id,
            payment_id,
            vec![PaymentStatus::Failed],
        );
        payment_repo
            .expect_update_status()
            .with(
                eq(payment_id),
                eq(vec![PaymentStatus::Failed]),
                eq(PaymentStatus::Success),
                eq(None),
            )
            .times(1)
            .returning(move |_, _, status, _| {
                let updated = payment(order_id, status);
                Box::pin(async move { Ok(Some(updated)) })
            });

        let mut order_provider = MockOrderProvider::new();
        order_provider
            .expect_update_order_status()
            .with(eq(order_id), eq(OrderStatus::Paid))
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                order_id,
                PaymentStatus::Success,
            )))),
        );

        let result = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Reconciled);
    }

    #[tokio::test]
    async fn losing_the_race_to_the_same_status_counts_as_applied() {
        let order_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();

        let mut seq = Sequence::new();
        let mut payment_repo = MockPaymentRepository::new();
        stored_payment_sequence(
            &mut payment_repo,
            &mut seq,
            order_id,
            payment_id,
            vec![PaymentStatus::Initiated, PaymentStatus::Success],
        );
        payment_repo
            .expect_update_status()
            .times(1)
            .returning(|_, _, _, _| Box::pin(async move { Ok(None) }));

        let mut order_provider = MockOrderProvider::new();
        order_provider
            .expect_update_order_status()
            .with(eq(order_id), eq(OrderStatus::Paid))
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                order_id,
                PaymentStatus::Success,
            )))),
        );

        let result = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::AlreadyApplied);
    }

    #[tokio::test]
    async fn losing_the_race_to_a_settled_payment_is_stale() {
        let order_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();

        let mut seq = Sequence::new();
        let mut payment_repo = MockPaymentRepository::new();
        stored_payment_sequence(
            &mut payment_repo,
            &mut seq,
            order_id,
            payment_id,
            vec![PaymentStatus::Initiated, PaymentStatus::Success],
        );
        payment_repo
            .expect_update_status()
            .times(1)
            .returning(|_, _, _, _| Box::pin(async move { Ok(None) }));

        let mut order_provider = MockOrderProvider::new();
        order_provider.expect_update_order_status().never();

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                order_id,
                PaymentStatus::Failed,
            )))),
        );

        let result = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Stale);
    }

    #[tokio::test]
    async fn losing_the_race_to_a_decline_retries_the_success() {
        let order_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();

        let mut seq = Sequence::new();
        let mut payment_repo = MockPaymentRepository::new();
        stored_payment_sequence(
            &mut payment_repo,
            &mut seq,
            order_id,
            payment_id,
            vec![PaymentStatus::Initiated, PaymentStatus::Failed],
        );
        payment_repo
            .expect_update_status()
            .with(
                eq(payment_id),
                eq(vec![PaymentStatus::Initiated]),
                eq(PaymentStatus::Success),
                eq(None),
            )
            .times(1)
            .returning(|_, _, _, _| Box::pin(async move { Ok(None) }));
        payment_repo
            .expect_update_status()
            .with(
                eq(payment_id),
                eq(vec![PaymentStatus::Failed]),
                eq(PaymentStatus::Success),
                eq(None),
            )
            .times(1)
            .returning(move |_, _, status, _| {
                let updated = payment(order_id, status);
                Box::pin(async move { Ok(Some(updated)) })
            });

        let mut order_provider = MockOrderProvider::new();
        order_provider
            .expect_update_order_status()
            .with(eq(order_id), eq(OrderStatus::Paid))
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                order_id,
                PaymentStatus::Success,
            )))),
        );

        let result = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Reconciled);
    }

    #[tokio::test]
    async fn late_success_for_cancelled_order_is_acknowledged() {
        let order_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();

        let mut seq = Sequence::new();
        let mut payment_repo = MockPaymentRepository::new();
        stored_payment_sequence(
            &mut payment_repo,
            &mut seq,
            order_id,
            payment_id,
            vec![PaymentStatus::Initiated],
        );
        payment_repo
            .expect_update_status()
            .times(1)
            .returning(move |_, _, status, _| {
                let updated = payment(order_id, status);
                Box::pin(async move { Ok(Some(updated)) })
            });

        let mut order_provider = MockOrderProvider::new();
        order_provider
            .expect_update_order_status()
            .with(eq(order_id), eq(OrderStatus::Paid))
            .times(1)
            .returning(|_, _| {
                Err(OrderError::InvalidTransition {
                    from: OrderStatus::Cancelled,
                    to: OrderStatus::Paid,
                })
            });

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                order_id,
                PaymentStatus::Success,
            )))),
        );

        let result = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Reconciled);
    }

    #[tokio::test]
    async fn initiated_and_ignored_events_are_no_ops() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_order_id().never();

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(MockOrderProvider::new()),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                Uuid::new_v4(),
                PaymentStatus::Initiated,
            )))),
        );
        assert_eq!(
            usecase.handle_webhook("stripe", b"{}", "sig").await.unwrap(),
            WebhookResult::Skipped
        );

        let usecase = PaymentUseCase::new(
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockOrderProvider::new()),
            Arc::new(gateway_emitting(WebhookOutcome::Ignored {
                event_type: "customer.created".to_string(),
            })),
        );
        assert_eq!(
            usecase.handle_webhook("stripe", b"{}", "sig").await.unwrap(),
            WebhookResult::Skipped
        );
    }

    #[tokio::test]
    async fn invalid_signature_touches_no_state() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_provider().return_const(PaymentProvider::Stripe);
        gateway
            .expect_parse_webhook()
            .returning(|_, _| Err(WebhookError::InvalidSignature("mismatch".to_string())));

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_order_id().never();
        payment_repo.expect_update_status().never();

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(MockOrderProvider::new()),
            Arc::new(gateway),
        );

        let err = usecase
            .handle_webhook("stripe", b"{}", "bad")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::InvalidWebhook(_)));
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_provider().return_const(PaymentProvider::Stripe);
        gateway.expect_parse_webhook().never();

        let usecase = PaymentUseCase::new(
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockOrderProvider::new()),
            Arc::new(gateway),
        );

        let err = usecase
            .handle_webhook("paypal", b"{}", "sig")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn missing_payment_row_is_an_error() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_by_order_id()
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(MockOrderProvider::new()),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                Uuid::new_v4(),
                PaymentStatus::Success,
            )))),
        );

        let err = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::PaymentNotFound(_)));
    }

    #[tokio::test]
    async fn order_failure_is_surfaced_so_the_provider_retries() {
        let order_id = Uuid::new_v4();
        let stored = payment(order_id, PaymentStatus::Initiated);

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_order_id().returning(move |_| {
            let stored = stored.clone();
            Box::pin(async move { Ok(Some(stored)) })
        });
        payment_repo
            .expect_update_status()
            .returning(move |_, _, status, _| {
                let updated = payment(order_id, status);
                Box::pin(async move { Ok(Some(updated)) })
            });

        let mut order_provider = MockOrderProvider::new();
        order_provider
            .expect_update_order_status()
            .returning(|_, _| Err(OrderError::Internal(anyhow::anyhow!("db down"))));

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(gateway_emitting(WebhookOutcome::Event(event(
                order_id,
                PaymentStatus::Success,
            )))),
        );

        let err = usecase
            .handle_webhook("stripe", b"{}", "sig")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Internal(_)));
    }

    #[tokio::test]
    async fn customers_only_see_payments_of_their_orders() {
        let owner = Uuid::new_v4();
        let order_id = Uuid::new_v4();

        let mut order_provider = MockOrderProvider::new();
        order_provider
            .expect_find_order_owner()
            .with(eq(order_id))
            .returning(move |_| Ok(Some(owner)));

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_by_order_id()
            .times(1)
            .returning(move |order_id| {
                let found = payment(order_id, PaymentStatus::Initiated);
                Box::pin(async move { Ok(Some(found)) })
            });

        let usecase = PaymentUseCase::new(
            Arc::new(payment_repo),
            Arc::new(order_provider),
            Arc::new(MockPaymentGateway::new()),
        );

        let found = usecase
            .get_payment_by_order(order_id, owner, false)
            .await
            .unwrap();
        assert_eq!(found.order_id, order_id);
        assert_eq!(found.status, PaymentStatus::Initiated);

        let err = usecase
            .get_payment_by_order(order_id, Uuid::new_v4(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Forbidden));
    }
}
