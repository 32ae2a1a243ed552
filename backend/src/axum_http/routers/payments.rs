use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State, rejection::PathRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use storefront_core::{
    domain::repositories::payments::PaymentRepository,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{orders::OrderPostgres, payments::PaymentPostgres, products::ProductPostgres},
    },
    payments::{gateway::PaymentGateway, stripe_client::StripeClient},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{AppError, ErrorResponse},
    usecases::{
        orders::{OrderSettings, OrderUseCase},
        payments::{OrderProvider, PaymentUseCase},
    },
};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

type OrderService = OrderUseCase<OrderPostgres, ProductPostgres, StripeClient>;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    payment_gateway: Arc<StripeClient>,
    settings: OrderSettings,
) -> Router {
    let order_usecase = OrderUseCase::new(
        Arc::new(OrderPostgres::new(Arc::clone(&db_pool))),
        Arc::new(ProductPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&payment_gateway),
        settings,
    );
    let payment_repository = PaymentPostgres::new(Arc::clone(&db_pool));
    let payment_usecase = PaymentUseCase::new(
        Arc::new(payment_repository),
        Arc::new(order_usecase),
        payment_gateway,
    );

    Router::new()
        .route(
            "/webhook/:provider",
            post(handle_webhook::<PaymentPostgres, OrderService, StripeClient>),
        )
        .route(
            "/order/:order_id",
            get(get_payment_by_order::<PaymentPostgres, OrderService, StripeClient>),
        )
        .with_state(Arc::new(payment_usecase))
}

/// Any failure answers 400 so the provider schedules a redelivery.
pub async fn handle_webhook<Pay, Ord, G>(
    State(payment_usecase): State<Arc<PaymentUseCase<Pay, Ord, G>>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Ord: OrderProvider + 'static,
    G: PaymentGateway + 'static,
{
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!(%provider, "payments: webhook without signature header");
        return webhook_rejected("missing signature header".to_string());
    };

    match payment_usecase
        .handle_webhook(&provider, &body, signature)
        .await
    {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "received": true }))).into_response(),
        Err(err) => {
            let message = if err.status_code().is_server_error() {
                "webhook could not be processed".to_string()
            } else {
                err.to_string()
            };
            webhook_rejected(message)
        }
    }
}

fn webhook_rejected(message: String) -> axum::response::Response {
    let status = StatusCode::BAD_REQUEST;
    (
        status,
        Json(ErrorResponse {
            code: status.as_u16(),
            message,
        }),
    )
        .into_response()
}

pub async fn get_payment_by_order<Pay, Ord, G>(
    State(payment_usecase): State<Arc<PaymentUseCase<Pay, Ord, G>>>,
    auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> impl IntoResponse
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Ord: OrderProvider + 'static,
    G: PaymentGateway + 'static,
{
    let Path(order_id) = match path {
        Ok(path) => path,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };

    match payment_usecase
        .get_payment_by_order(order_id, auth.user_id, auth.is_admin())
        .await
    {
        Ok(payment) => (StatusCode::OK, Json(payment)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
