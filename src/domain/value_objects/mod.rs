pub mod order_number;
pub mod points;
