pub mod balance;
pub mod order;
pub mod user;
pub mod withdrawal;
