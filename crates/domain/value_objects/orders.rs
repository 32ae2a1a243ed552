use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    entities::{
        order_items::{InsertOrderItemEntity, OrderItemEntity},
        orders::{OrderAggregate, OrderEntity},
        products::ProductEntity,
    },
    value_objects::{enums::order_statuses::OrderStatus, pagination::PageMeta},
};

/// Client supplied shipping payload. Stored and returned verbatim; decode lazily when needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ShippingInfo(serde_json::Value);

impl ShippingInfo {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.0.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceOrderModel {
    pub items: Vec<PlaceOrderItem>,
    #[serde(default)]
    pub shipping_info: ShippingInfo,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateOrderStatusModel {
    pub status: OrderStatus,
}

/// One priced line: the product snapshot taken at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl PricedLine {
    /// Returns `None` when the line total does not fit in an i64.
    pub fn from_product(product: &ProductEntity, quantity: i32) -> Option<Self> {
        let total_cents = line_total_cents(product.price_cents, quantity)?;
        Some(Self {
            product_id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity,
            unit_price_cents: product.price_cents,
            total_cents,
        })
    }

    pub fn to_insert_entity(&self, order_id: Uuid, line_no: i32) -> InsertOrderItemEntity {
        InsertOrderItemEntity {
            order_id,
            line_no,
            product_id: self.product_id,
            sku: self.sku.clone(),
            name: self.name.clone(),
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
            total_cents: self.total_cents,
        }
    }
}

pub fn line_total_cents(unit_price_cents: i64, quantity: i32) -> Option<i64> {
    unit_price_cents.checked_mul(i64::from(quantity))
}

/// Monetary breakdown of an order, all in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub final_cents: i64,
}

impl OrderTotals {
    /// Sums the line totals. Discount, tax and shipping are not computed by checkout and stay zero.
    pub fn from_lines(lines: &[PricedLine]) -> Option<Self> {
        let subtotal_cents = lines
            .iter()
            .try_fold(0i64, |acc, line| acc.checked_add(line.total_cents))?;
        Self::compose(subtotal_cents, 0, 0, 0)
    }

    /// `final = subtotal - discount + tax + shipping`, `total` mirrors `final`.
    pub fn compose(
        subtotal_cents: i64,
        discount_cents: i64,
        tax_cents: i64,
        shipping_cents: i64,
    ) -> Option<Self> {
        let final_cents = subtotal_cents
            .checked_sub(discount_cents)?
            .checked_add(tax_cents)?
            .checked_add(shipping_cents)?;

        Some(Self {
            subtotal_cents,
            discount_cents,
            tax_cents,
            shipping_cents,
            total_cents: final_cents,
            final_cents,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItemModel {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl From<OrderItemEntity> for OrderItemModel {
    fn from(value: OrderItemEntity) -> Self {
        Self {
            id: value.id,
            product_id: value.product_id,
            sku: value.sku,
            name: value.name,
            quantity: value.quantity,
            unit_price_cents: value.unit_price_cents,
            total_cents: value.total_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderModel {
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
    pub status: OrderStatus,
    pub shipping_info: ShippingInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub items: Vec<OrderItemModel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderModel {
    pub fn from_parts(order: OrderEntity, items: Vec<OrderItemEntity>) -> Self {
        let mut items = items;
        items.sort_by_key(|item| item.line_no);

        Self {
            id: order.id,
            user_id: order.user_id,
            order_number: order.order_number,
            subtotal_cents: order.subtotal_cents,
            discount_cents: order.discount_cents,
            tax_cents: order.tax_cents,
            shipping_cents: order.shipping_cents,
            total_cents: order.total_cents,
            final_cents: order.final_cents,
            currency: order.currency,
            status: OrderStatus::from_str(&order.status).unwrap_or_else(|| {
                warn!(
                    order_id = %order.id,
                    status = %order.status,
                    "orders: unknown stored status, reporting as PENDING"
                );
                OrderStatus::default()
            }),
            shipping_info: ShippingInfo::new(order.shipping_info),
            notes: order.notes,
            items: items.into_iter().map(OrderItemModel::from).collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<OrderAggregate> for OrderModel {
    fn from(value: OrderAggregate) -> Self {
        OrderModel::from_parts(value.order, value.items)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlacedOrderDto {
    pub order: OrderModel,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderPageDto {
    pub orders: Vec<OrderModel>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(unit_price_cents: i64, quantity: i32) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            sku: "SKU".to_string(),
            name: "Product".to_string(),
            quantity,
            unit_price_cents,
            total_cents: line_total_cents(unit_price_cents, quantity).unwrap(),
        }
    }

    #[test]
    fn totals_for_checkout_example() {
        let totals = OrderTotals::from_lines(&[line(2500, 2), line(1000, 1)]).unwrap();

        assert_eq!(totals.subtotal_cents, 6000);
        assert_eq!(totals.total_cents, 6000);
        assert_eq!(totals.final_cents, 6000);
        assert_eq!(totals.discount_cents, 0);
        assert_eq!(totals.tax_cents, 0);
        assert_eq!(totals.shipping_cents, 0);
    }

    #[test]
    fn compose_applies_discount_tax_and_shipping() {
        let totals = OrderTotals::compose(10_000, 1_500, 800, 499).unwrap();
        assert_eq!(totals.final_cents, 10_000 - 1_500 + 800 + 499);
        assert_eq!(totals.total_cents, totals.final_cents);
    }

    #[test]
    fn overflow_is_reported_instead_of_wrapping() {
        assert_eq!(line_total_cents(i64::MAX, 2), None);
        let huge = PricedLine {
            total_cents: i64::MAX,
            ..line(1, 1)
        };
        assert_eq!(OrderTotals::from_lines(&[huge.clone(), huge]), None);
    }

    fn stored_order(status: &str) -> OrderEntity {
        let now = Utc::now();
        OrderEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_number: "ORD-20250101000000-000000000000".to_string(),
            subtotal_cents: 6000,
            discount_cents: 0,
            tax_cents: 0,
            shipping_cents: 0,
            total_cents: 6000,
            final_cents: 6000,
            currency: "USD".to_string(),
            status: status.to_string(),
            shipping_info: serde_json::json!({}),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stored_status_maps_onto_the_model() {
        assert_eq!(
            OrderModel::from_parts(stored_order("SHIPPED"), vec![]).status,
            OrderStatus::Shipped
        );
        assert_eq!(
            OrderModel::from_parts(stored_order("CREATED"), vec![]).status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn unknown_stored_status_reads_as_pending() {
        let model = OrderModel::from_parts(stored_order("ON_HOLD"), vec![]);
        assert_eq!(model.status, OrderStatus::Pending);
    }

    #[test]
    fn shipping_info_round_trips_verbatim() {
        let raw = serde_json::json!({
            "name": "Ada",
            "lines": ["1 Main St", "Apt 2"],
            "geo": { "lat": 1.5, "lng": -2.25 }
        });
        let info: ShippingInfo = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(serde_json::to_value(&info).unwrap(), raw);
        assert_eq!(info.clone().into_value(), raw);

        #[derive(Deserialize)]
        struct Partial {
            name: String,
        }
        assert_eq!(info.decode::<Partial>().unwrap().name, "Ada");
    }

    proptest! {
        #[test]
        fn subtotal_is_exact_sum_of_price_times_quantity(
            items in prop::collection::vec((0i64..10_000_000, 1i32..1_000), 1..20)
        ) {
            let lines: Vec<PricedLine> = items.iter().map(|(price, qty)| line(*price, *qty)).collect();
            let expected: i128 = items.iter().map(|(price, qty)| i128::from(*price) * i128::from(*qty)).sum();

            let totals = OrderTotals::from_lines(&lines).unwrap();

            prop_assert_eq!(i128::from(totals.subtotal_cents), expected);
            prop_assert_eq!(totals.final_cents, totals.subtotal_cents);
        }
    }
}
