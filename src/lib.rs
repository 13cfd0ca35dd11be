//! Loyalty Ledger Library
//!
//! Users register, post purchase order numbers, earn points once an external
//! accrual system processes those orders, and withdraw points against their
//! balance.

pub mod application;
pub mod auth;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod secrets;
