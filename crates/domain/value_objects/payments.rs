use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::payments::PaymentEntity,
    value_objects::enums::{payment_methods::PaymentMethod, payment_statuses::PaymentStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentModel {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: String,
    pub provider_txn_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentEntity> for PaymentModel {
    fn from(value: PaymentEntity) -> Self {
        Self {
            id: value.id,
            order_id: value.order_id,
            provider: value.provider,
            provider_txn_id: value.provider_txn_id,
            amount_cents: value.amount_cents,
            currency: value.currency,
            payment_method: PaymentMethod::from_str(&value.payment_method).unwrap_or_default(),
            status: PaymentStatus::from_str(&value.status).unwrap_or_default(),
            failure_reason: value.failure_reason,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
