pub mod order_items;
pub mod orders;
pub mod payments;
pub mod products;
