use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use storefront_core::{
    domain::{
        entities::{
            orders::{InsertOrderEntity, OrderAggregate},
            payments::InsertPaymentEntity,
        },
        repositories::{orders::OrderRepository, products::ProductProvider},
        value_objects::{
            enums::{
                order_statuses::OrderStatus, payment_methods::PaymentMethod,
                payment_statuses::PaymentStatus,
            },
            order_numbers::generate_order_number,
            orders::{
                OrderModel, OrderPageDto, OrderTotals, PlaceOrderModel, PlacedOrderDto,
                PricedLine,
            },
            pagination::Pagination,
        },
    },
    payments::gateway::PaymentGateway,
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::payments::OrderProvider;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order must contain at least one item")]
    EmptyOrder,
    #[error("quantity must be at least 1 for product {product_id}")]
    InvalidQuantity { product_id: Uuid, quantity: i32 },
    #[error("product not found: {0}")]
    ProductNotFound(Uuid),
    #[error("product is not available: {0}")]
    ProductInactive(Uuid),
    #[error("product {product_id} is priced in {currency}, orders are placed in {store_currency}")]
    CurrencyMismatch {
        product_id: Uuid,
        currency: String,
        store_currency: String,
    },
    #[error("order amount is out of range")]
    AmountOverflow,
    #[error("order total must be greater than zero")]
    NonPositiveTotal,
    #[error("order not found")]
    OrderNotFound,
    #[error("order belongs to another user")]
    Forbidden,
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("payment provider request failed")]
    Gateway(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OrderError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            OrderError::EmptyOrder
            | OrderError::InvalidQuantity { .. }
            | OrderError::ProductNotFound(_)
            | OrderError::ProductInactive(_)
            | OrderError::CurrencyMismatch { .. }
            | OrderError::AmountOverflow
            | OrderError::NonPositiveTotal => StatusCode::BAD_REQUEST,
            OrderError::OrderNotFound => StatusCode::NOT_FOUND,
            OrderError::Forbidden => StatusCode::FORBIDDEN,
            OrderError::InvalidTransition { .. } => StatusCode::CONFLICT,
            OrderError::Gateway(_) | OrderError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, OrderError>;

#[derive(Debug, Clone)]
pub struct OrderSettings {
    pub currency: String,
    pub order_number_prefix: String,
}

pub struct OrderUseCase<O, P, G>
where
    O: OrderRepository + Send + Sync + 'static,
    P: ProductProvider + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    order_repo: Arc<O>,
    product_provider: Arc<P>,
    payment_gateway: Arc<G>,
    settings: OrderSettings,
}

impl<O, P, G> OrderUseCase<O, P, G>
where
    O: OrderRepository + Send + Sync + 'static,
    P: ProductProvider + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        order_repo: Arc<O>,
        product_provider: Arc<P>,
        payment_gateway: Arc<G>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            order_repo,
            product_provider,
            payment_gateway,
            settings,
        }
    }

    async fn price_items(&self, place_order: &PlaceOrderModel) -> UseCaseResult<Vec<PricedLine>> {
        if place_order.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut lines = Vec::with_capacity(place_order.items.len());
        for item in &place_order.items {
            if item.quantity < 1 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }

            let product = self
                .product_provider
                .find_product_by_id(item.product_id)
                .await
                .map_err(|err| {
                    error!(
                        product_id = %item.product_id,
                        db_error = ?err,
                        "orders: failed to load product"
                    );
                    OrderError::Internal(err)
                })?
                .ok_or(OrderError::ProductNotFound(item.product_id))?;

            if !product.is_active {
                return Err(OrderError::ProductInactive(product.id));
            }

            if !product.currency.eq_ignore_ascii_case(&self.settings.currency) {
                return Err(OrderError::CurrencyMismatch {
                    product_id: product.id,
                    currency: product.currency,
                    store_currency: self.settings.currency.clone(),
                });
            }

            let line = PricedLine::from_product(&product, item.quantity)
                .ok_or(OrderError::AmountOverflow)?;
            lines.push(line);
        }

        Ok(lines)
    }

    /// Prices the cart, opens a payment intent, then stores order, items and the
    /// INITIATED payment atomically. The intent is cancelled if that write fails.
    pub async fn place_order(
        &self,
        user_id: Uuid,
        place_order: PlaceOrderModel,
    ) -> UseCaseResult<PlacedOrderDto> {
        let lines = self.price_items(&place_order).await.inspect_err(|err| {
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                error = %err,
                "orders: rejected order"
            );
        })?;

        let totals = OrderTotals::from_lines(&lines).ok_or(OrderError::AmountOverflow)?;
        if totals.final_cents <= 0 {
            return Err(OrderError::NonPositiveTotal);
        }

        let order_id = Uuid::new_v4();
        let order_number = generate_order_number(&self.settings.order_number_prefix);
        let currency = self.settings.currency.clone();

        let metadata = HashMap::from([
            ("user_id".to_string(), user_id.to_string()),
            ("order_id".to_string(), order_id.to_string()),
            ("order_number".to_string(), order_number.clone()),
        ]);

        let intent = self
            .payment_gateway
            .create_intent(
                totals.final_cents,
                &currency,
                metadata,
                &format!("order-{order_id}"),
            )
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %order_id,
                    amount_cents = totals.final_cents,
                    gateway_error = ?err,
                    "orders: failed to create payment intent"
                );
                OrderError::Gateway(err)
            })?;

        let insert_order = InsertOrderEntity {
            id: order_id,
            user_id,
            order_number,
            subtotal_cents: totals.subtotal_cents,
            discount_cents: totals.discount_cents,
            tax_cents: totals.tax_cents,
            shipping_cents: totals.shipping_cents,
            total_cents: totals.total_cents,
            final_cents: totals.final_cents,
            currency: currency.clone(),
            status: OrderStatus::Pending.to_string(),
            shipping_info: place_order.shipping_info.into_value(),
            notes: place_order.notes,
        };

        let insert_items = lines
            .iter()
            .zip(1..)
            .map(|(line, line_no)| line.to_insert_entity(order_id, line_no))
            .collect();

        let insert_payment = InsertPaymentEntity {
            order_id,
            provider: self.payment_gateway.provider().to_string(),
            provider_txn_id: Some(intent.id.clone()),
            amount_cents: totals.final_cents,
            currency,
            payment_method: PaymentMethod::Stripe.to_string(),
            status: PaymentStatus::Initiated.to_string(),
            failure_reason: None,
        };

        let aggregate = match self
            .order_repo
            .create_order_with_payment(insert_order, insert_items, insert_payment)
            .await
        {
            Ok(aggregate) => aggregate,
            Err(err) => {
                error!(
                    %user_id,
                    %order_id,
                    intent_id = %intent.id,
                    db_error = ?err,
                    "orders: failed to persist order, cancelling payment intent"
                );
                if let Err(cancel_err) = self.payment_gateway.cancel_intent(&intent.id).await {
                    error!(
                        %order_id,
                        intent_id = %intent.id,
                        gateway_error = ?cancel_err,
                        "orders: failed to cancel orphaned payment intent"
                    );
                }
                return Err(OrderError::Internal(err));
            }
        };

        info!(
            %user_id,
            %order_id,
            order_number = %aggregate.order.order_number,
            final_cents = aggregate.order.final_cents,
            intent_id = %intent.id,
            "orders: order placed"
        );

        Ok(PlacedOrderDto {
            order: OrderModel::from(aggregate),
            client_secret: intent.client_secret,
        })
    }

    async fn load_order(&self, order_id: Uuid) -> UseCaseResult<OrderAggregate> {
        self.order_repo
            .find_by_id(order_id)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "orders: failed to load order");
                OrderError::Internal(err)
            })?
            .ok_or(OrderError::OrderNotFound)
    }

    /// Admins may read any order; everyone else only their own.
    pub async fn get_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> UseCaseResult<OrderModel> {
        let aggregate = self.load_order(order_id).await?;

        if !is_admin && aggregate.order.user_id != user_id {
            warn!(%order_id, %user_id, "orders: access to foreign order denied");
            return Err(OrderError::Forbidden);
        }

        Ok(OrderModel::from(aggregate))
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> UseCaseResult<OrderPageDto> {
        let orders = self
            .order_repo
            .list_by_user_id(user_id, pagination.limit(), pagination.offset())
            .await?;
        let total = self.order_repo.count_by_user_id(user_id).await?;

        Ok(OrderPageDto {
            orders: orders.into_iter().map(OrderModel::from).collect(),
            meta: pagination.meta(total),
        })
    }

    pub async fn list_all_orders(&self, pagination: Pagination) -> UseCaseResult<OrderPageDto> {
        let orders = self
            .order_repo
            .list_all(pagination.limit(), pagination.offset())
            .await?;
        let total = self.order_repo.count_all().await?;

        Ok(OrderPageDto {
            orders: orders.into_iter().map(OrderModel::from).collect(),
            meta: pagination.meta(total),
        })
    }

    /// Re-applying the current status is a no-op; anything outside the order state machine is a conflict.
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> UseCaseResult<OrderModel> {
        let aggregate = self.load_order(order_id).await?;
        let current = OrderStatus::from_str(&aggregate.order.status).ok_or_else(|| {
            OrderError::Internal(anyhow::anyhow!(
                "order {} has unknown status {}",
                order_id,
                aggregate.order.status
            ))
        })?;

        if current == status {
            return Ok(OrderModel::from(aggregate));
        }

        if !current.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        match self
            .order_repo
            .update_status(order_id, current, status)
            .await?
        {
            Some(order) => {
                info!(%order_id, from = %current, to = %status, "orders: status updated");
                Ok(OrderModel::from_parts(order, aggregate.items))
            }
            None => {
                // Lost the compare-and-swap; report against whatever won.
                let latest = self.load_order(order_id).await?;
                match OrderStatus::from_str(&latest.order.status) {
                    Some(now) if now == status => Ok(OrderModel::from(latest)),
                    Some(now) => Err(OrderError::InvalidTransition {
                        from: now,
                        to: status,
                    }),
                    None => Err(OrderError::Internal(anyhow::anyhow!(
                        "order {} has unknown status {}",
                        order_id,
                        latest.order.status
                    ))),
                }
            }
        }
    }

    pub async fn delete_order(&self, order_id: Uuid) -> UseCaseResult<()> {
        let deleted = self.order_repo.delete(order_id).await.map_err(|err| {
            error!(%order_id, db_error = ?err, "orders: failed to delete order");
            OrderError::Internal(err)
        })?;

        if !deleted {
            return Err(OrderError::OrderNotFound);
        }

        info!(%order_id, "orders: order deleted");
        Ok(())
    }
}

#[async_trait]
impl<O, P, G> OrderProvider for OrderUseCase<O, P, G>
where
    O: OrderRepository + Send + Sync + 'static,
    P: ProductProvider + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    async fn find_order_owner(&self, order_id: Uuid) -> UseCaseResult<Option<Uuid>> {
        let order = self.order_repo.find_by_id(order_id).await?;
        Ok(order.map(|aggregate| aggregate.order.user_id))
    }

    async fn update_order_status(&self, order_id: Uuid, status: OrderStatus) -> UseCaseResult<()> {
        OrderUseCase::update_order_status(self, order_id, status)
            .await
            .map(|_| ())
    }
}
