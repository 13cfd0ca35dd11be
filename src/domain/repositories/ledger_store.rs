//! Ledger Store Traits
//!
//! Abstract persistence consumed by the ledger services and the accrual
//! worker. Implementations live in `crate::persistence`.
//!
//! Concurrency contract:
//! - order number uniqueness is enforced by the store; a duplicate insert
//!   reports the existing row instead of failing
//! - `ledger_snapshot` reads orders and withdrawals in one consistent unit
//! - `insert_withdrawal_guarded` evaluates the guard and inserts atomically
//!   with respect to every other guarded insert for the same owner
//! - `update_orders` is all-or-nothing

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::entities::balance::LedgerSnapshot;
use crate::domain::entities::order::{Order, OrderUpdate};
use crate::domain::entities::user::{User, UserId};
use crate::domain::entities::withdrawal::{NewWithdrawal, Withdrawal};
use crate::domain::value_objects::order_number::OrderNumber;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} failed for '{key}': {message}")]
    Query {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("corrupt row in {table}: {message}")]
    CorruptRow {
        table: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created(User),
    LoginTaken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Order),
    /// Uniqueness constraint hit; carries the row that already holds the number
    Existing(Order),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardedInsert {
    Committed(Withdrawal),
    /// Guard refused; carries the snapshot it was evaluated against
    Rejected(LedgerSnapshot),
}

/// Predicate evaluated inside the store's withdrawal critical section.
///
/// Owned so a store can finish the critical section on a task of its own.
pub type WithdrawalGuard = Arc<dyn Fn(&LedgerSnapshot) -> bool + Send + Sync>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, login: &str, password_hash: &str)
        -> StoreResult<CreateUserOutcome>;

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: Order) -> StoreResult<InsertOutcome>;

    async fn find_order(&self, number: &OrderNumber) -> StoreResult<Option<Order>>;

    /// Newest first
    async fn list_orders(&self, owner: UserId) -> StoreResult<Vec<Order>>;

    /// Every order whose status is not terminal, across all owners
    async fn list_not_finished(&self) -> StoreResult<Vec<Order>>;

    async fn update_orders(&self, updates: &[OrderUpdate]) -> StoreResult<()>;
}

#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    async fn ledger_snapshot(&self, owner: UserId) -> StoreResult<LedgerSnapshot>;

    async fn insert_withdrawal_guarded(
        &self,
        withdrawal: NewWithdrawal,
        guard: WithdrawalGuard,
    ) -> StoreResult<GuardedInsert>;

    /// Oldest first
    async fn list_withdrawals(&self, owner: UserId) -> StoreResult<Vec<Withdrawal>>;
}

/// Everything the ledger needs from one backing store
pub trait LedgerStore: UserStore + OrderStore + WithdrawalStore {}

impl<T> LedgerStore for T where T: UserStore + OrderStore + WithdrawalStore {}
