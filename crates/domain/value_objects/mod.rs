pub mod enums;
pub mod order_numbers;
pub mod orders;
pub mod pagination;
pub mod payments;
