pub mod accrual_oracle;
pub mod ledger_store;
