use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{domain::entities::order_items::OrderItemEntity, infra::db::postgres::schema::orders};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = orders)]
pub struct OrderEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub final_cents: i64,
    pub currency: String,
    pub status: String,
    pub shipping_info: serde_json::Value,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The id is chosen by the caller so it can be handed to the payment gateway before the insert.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = orders)]
pub struct InsertOrderEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub final_cents: i64,
    pub currency: String,
    pub status: String,
    pub shipping_info: serde_json::Value,
    pub notes: Option<String>,
}

/// An order row together with its line items, ordered by `line_no`.
#[derive(Debug, Clone)]
pub struct OrderAggregate {
    pub order: OrderEntity,
    pub items: Vec<OrderItemEntity>,
}
