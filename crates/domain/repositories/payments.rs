use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::payments::PaymentEntity, value_objects::enums::payment_statuses::PaymentStatus,
};

#[async_trait]
#[automock]
pub trait PaymentRepository {
    async fn find_by_order_id(&self, order_id: Uuid) -> Result<Option<PaymentEntity>>;

    /// Compare-and-swap on the status column: only rows currently in one of `from` are updated.
    async fn update_status(
        &self,
        payment_id: Uuid,
        from: Vec<PaymentStatus>,
        status: PaymentStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<PaymentEntity>>;
}
