use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payments;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: String,
    pub provider_txn_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub order_id: Uuid,
    pub provider: String,
    pub provider_txn_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: String,
    pub failure_reason: Option<String>,
}
