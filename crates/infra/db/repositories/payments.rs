use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::payments::{InsertPaymentEntity, PaymentEntity},
        repositories::payments::PaymentRepository,
        value_objects::enums::payment_statuses::PaymentStatus,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payments},
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Shared with the order repository so the initial payment lands in the order's transaction.
pub(crate) fn insert_payment(
    conn: &mut PgConnection,
    payment: &InsertPaymentEntity,
) -> QueryResult<PaymentEntity> {
    insert_into(payments::table)
        .values(payment)
        .returning(PaymentEntity::as_select())
        .get_result::<PaymentEntity>(conn)
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn find_by_order_id(&self, order_id: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .filter(payments::order_id.eq(order_id))
            .order(payments::created_at.desc())
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn update_status(
        &self,
        payment_id: Uuid,
        from: Vec<PaymentStatus>,
        status: PaymentStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let from: Vec<&str> = from.iter().map(PaymentStatus::as_str).collect();

        let updated = diesel::update(
            payments::table
                .filter(payments::id.eq(payment_id))
                .filter(payments::status.eq_any(from)),
        )
        .set((
            payments::status.eq(status.as_str()),
            payments::failure_reason.eq(failure_reason),
            payments::updated_at.eq(Utc::now()),
        ))
        .returning(PaymentEntity::as_select())
        .get_result::<PaymentEntity>(&mut conn)
        .optional()?;

        Ok(updated)
    }
}
