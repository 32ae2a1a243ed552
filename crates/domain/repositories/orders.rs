use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::{
        order_items::InsertOrderItemEntity,
        orders::{InsertOrderEntity, OrderAggregate, OrderEntity},
        payments::InsertPaymentEntity,
    },
    value_objects::enums::order_statuses::OrderStatus,
};

#[async_trait]
#[automock]
pub trait OrderRepository {
    /// Inserts the order, its items and the initial payment in a single transaction.
    async fn create_order_with_payment(
        &self,
        order: InsertOrderEntity,
        items: Vec<InsertOrderItemEntity>,
        payment: InsertPaymentEntity,
    ) -> Result<OrderAggregate>;

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderAggregate>>;

    async fn list_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OrderAggregate>>;

    async fn count_by_user_id(&self, user_id: Uuid) -> Result<i64>;

    async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<OrderAggregate>>;

    async fn count_all(&self) -> Result<i64>;

    /// Moves the order to `status` only while it is still in `expected`.
    /// `None` means the row was missing or had already moved on.
    async fn update_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Option<OrderEntity>>;

    async fn delete(&self, order_id: Uuid) -> Result<bool>;
}
