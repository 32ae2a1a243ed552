use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use storefront_core::{
    domain::{
        repositories::{orders::OrderRepository, products::ProductProvider},
        value_objects::{
            orders::{PlaceOrderModel, UpdateOrderStatusModel},
            pagination::{Pagination, PaginationQuery},
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{orders::OrderPostgres, products::ProductPostgres},
    },
    payments::{gateway::PaymentGateway, stripe_client::StripeClient},
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::orders::{OrderSettings, OrderUseCase},
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    payment_gateway: Arc<StripeClient>,
    settings: OrderSettings,
) -> Router {
    let order_repository = OrderPostgres::new(Arc::clone(&db_pool));
    let product_repository = ProductPostgres::new(Arc::clone(&db_pool));
    let order_usecase = OrderUseCase::new(
        Arc::new(order_repository),
        Arc::new(product_repository),
        payment_gateway,
        settings,
    );

    Router::new()
        .route(
            "/",
            get(list_orders::<OrderPostgres, ProductPostgres, StripeClient>)
                .post(place_order::<OrderPostgres, ProductPostgres, StripeClient>),
        )
        .route(
            "/all",
            get(list_all_orders::<OrderPostgres, ProductPostgres, StripeClient>),
        )
        .route(
            "/:order_id",
            get(get_order::<OrderPostgres, ProductPostgres, StripeClient>)
                .put(update_order_status::<OrderPostgres, ProductPostgres, StripeClient>)
                .delete(delete_order::<OrderPostgres, ProductPostgres, StripeClient>),
        )
        .with_state(Arc::new(order_usecase))
}

pub async fn place_order<O, P, G>(
    State(order_usecase): State<Arc<OrderUseCase<O, P, G>>>,
    auth: AuthUser,
    payload: Result<Json<PlaceOrderModel>, JsonRejection>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: ProductProvider + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let Json(place_order_model) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };

    match order_usecase.place_order(auth.user_id, place_order_model).await {
        Ok(placed) => (StatusCode::CREATED, Json(placed)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn list_orders<O, P, G>(
    State(order_usecase): State<Arc<OrderUseCase<O, P, G>>>,
    auth: AuthUser,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: ProductProvider + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };

    match order_usecase
        .list_orders(auth.user_id, Pagination::from(query))
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn list_all_orders<O, P, G>(
    State(order_usecase): State<Arc<OrderUseCase<O, P, G>>>,
    auth: AuthUser,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: ProductProvider + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };

    if !auth.is_admin() {
        return AppError::Forbidden.into_response();
    }

    match order_usecase.list_all_orders(Pagination::from(query)).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn get_order<O, P, G>(
    State(order_usecase): State<Arc<OrderUseCase<O, P, G>>>,
    auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: ProductProvider + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let Path(order_id) = match path {
        Ok(path) => path,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };

    match order_usecase
        .get_order(order_id, auth.user_id, auth.is_admin())
        .await
    {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn update_order_status<O, P, G>(
    State(order_usecase): State<Arc<OrderUseCase<O, P, G>>>,
    auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateOrderStatusModel>, JsonRejection>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: ProductProvider + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let Path(order_id) = match path {
        Ok(path) => path,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };

    if !auth.is_admin() {
        return AppError::Forbidden.into_response();
    }

    let Json(update_model) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };

    match order_usecase
        .update_order_status(order_id, update_model.status)
        .await
    {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn delete_order<O, P, G>(
    State(order_usecase): State<Arc<OrderUseCase<O, P, G>>>,
    auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: ProductProvider + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let Path(order_id) = match path {
        Ok(path) => path,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };

    if !auth.is_admin() {
        return AppError::Forbidden.into_response();
    }

    match order_usecase.delete_order(order_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
