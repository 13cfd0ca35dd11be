pub mod balance_calculator;
pub mod identity_service;
pub mod order_ledger;
pub mod token_service;
pub mod withdrawal_service;
