use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

/// How a Stripe event type feeds reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventMapping {
    /// `data.object` is a PaymentIntent carrying our metadata.
    PaymentIntent(PaymentStatus),
    /// `data.object` is a Charge; metadata may have to come from its PaymentIntent.
    Charge(PaymentStatus),
    /// `charge.updated`: the status is read from the charge itself.
    ChargeFromStatus,
}

pub fn mapping_for(event_type: &str) -> Option<EventMapping> {
    let mapping = match event_type {
        "payment_intent.created" => EventMapping::PaymentIntent(PaymentStatus::Initiated),
        "payment_intent.succeeded" => EventMapping::PaymentIntent(PaymentStatus::Success),
        "payment_intent.payment_failed" => EventMapping::PaymentIntent(PaymentStatus::Failed),
        "charge.succeeded" | "charge.captured" => EventMapping::Charge(PaymentStatus::Success),
        "charge.failed" => EventMapping::Charge(PaymentStatus::Failed),
        "charge.pending" => EventMapping::Charge(PaymentStatus::Initiated),
        "charge.refunded" => EventMapping::Charge(PaymentStatus::Refunded),
        "charge.updated" => EventMapping::ChargeFromStatus,
        _ => return None,
    };
    Some(mapping)
}

pub fn charge_status(status: &str) -> Option<PaymentStatus> {
    match status {
        "succeeded" => Some(PaymentStatus::Success),
        "failed" => Some(PaymentStatus::Failed),
        "pending" => Some(PaymentStatus::Initiated),
        _ => None,
    }
}

pub const ORDER_ID_KEY: &str = "order_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOrderId {
    Found(Uuid),
    Missing,
    Invalid(String),
}

pub fn order_id_from_metadata(metadata: &HashMap<String, String>) -> MetadataOrderId {
    match metadata.get(ORDER_ID_KEY).map(|value| value.trim()) {
        None | Some("") => MetadataOrderId::Missing,
        Some(value) => match Uuid::parse_str(value) {
            Ok(order_id) => MetadataOrderId::Found(order_id),
            Err(_) => MetadataOrderId::Invalid(value.to_string()),
        },
    }
}
