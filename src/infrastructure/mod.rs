pub mod accrual_client;
