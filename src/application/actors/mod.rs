pub mod accrual_worker;

pub use accrual_worker::{AccrualWorker, AccrualWorkerHandle, TickReport, WorkerConfig, WorkerStats};
