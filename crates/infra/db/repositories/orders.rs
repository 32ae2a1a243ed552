use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            order_items::{InsertOrderItemEntity, OrderItemEntity},
            orders::{InsertOrderEntity, OrderAggregate, OrderEntity},
            payments::InsertPaymentEntity,
        },
        repositories::orders::OrderRepository,
        value_objects::enums::order_statuses::OrderStatus,
    },
    infra::db::{
        postgres::{
            postgres_connection::PgPoolSquad,
            schema::{order_items, orders},
        },
        repositories::payments::insert_payment,
    },
};

pub struct OrderPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn attach_items(
    conn: &mut PgConnection,
    orders: Vec<OrderEntity>,
) -> QueryResult<Vec<OrderAggregate>> {
    let items = OrderItemEntity::belonging_to(&orders)
        .select(OrderItemEntity::as_select())
        .order(order_items::line_no.asc())
        .load::<OrderItemEntity>(conn)?;

    let grouped = items.grouped_by(&orders);

    Ok(orders
        .into_iter()
        .zip(grouped)
        .map(|(order, items)| OrderAggregate { order, items })
        .collect())
}

#[async_trait]
impl OrderRepository for OrderPostgres {
    async fn create_order_with_payment(
        &self,
        order: InsertOrderEntity,
        items: Vec<InsertOrderItemEntity>,
        payment: InsertPaymentEntity,
    ) -> Result<OrderAggregate> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let aggregate = conn.transaction::<OrderAggregate, diesel::result::Error, _>(|conn| {
            let order = insert_into(orders::table)
                .values(&order)
                .returning(OrderEntity::as_select())
                .get_result::<OrderEntity>(conn)?;

            let items = insert_into(order_items::table)
                .values(&items)
                .returning(OrderItemEntity::as_select())
                .get_results::<OrderItemEntity>(conn)?;

            insert_payment(conn, &payment)?;

            Ok(OrderAggregate { order, items })
        })?;

        Ok(aggregate)
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderAggregate>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let order = orders::table
            .find(order_id)
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let aggregate = attach_items(&mut conn, vec![order])?.pop();

        Ok(aggregate)
    }

    async fn list_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OrderAggregate>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let orders = orders::table
            .filter(orders::user_id.eq(user_id))
            .order((orders::created_at.desc(), orders::id.desc()))
            .limit(limit)
            .offset(offset)
            .select(OrderEntity::as_select())
            .load::<OrderEntity>(&mut conn)?;

        Ok(attach_items(&mut conn, orders)?)
    }

    async fn count_by_user_id(&self, user_id: Uuid) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = orders::table
            .filter(orders::user_id.eq(user_id))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(total)
    }

    async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<OrderAggregate>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let orders = orders::table
            .order((orders::created_at.desc(), orders::id.desc()))
            .limit(limit)
            .offset(offset)
            .select(OrderEntity::as_select())
            .load::<OrderEntity>(&mut conn)?;

        Ok(attach_items(&mut conn, orders)?)
    }

    async fn count_all(&self) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = orders::table.count().get_result::<i64>(&mut conn)?;

        Ok(total)
    }

    async fn update_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(expected.as_str())),
        )
        .set((
            orders::status.eq(status.as_str()),
            orders::updated_at.eq(Utc::now()),
        ))
        .returning(OrderEntity::as_select())
        .get_result::<OrderEntity>(&mut conn)
        .optional()?;

        Ok(updated)
    }

    async fn delete(&self, order_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // order_items and payments go with it through ON DELETE CASCADE
        let deleted = diesel::delete(orders::table.find(order_id)).execute(&mut conn)?;

        Ok(deleted > 0)
    }
}
