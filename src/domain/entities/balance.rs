//! Balance entity - derived, never persisted

use crate::domain::entities::order::{Order, OrderStatus};
use crate::domain::entities::withdrawal::Withdrawal;
use crate::domain::value_objects::points::Points;

/// Source rows for one owner, read in a single consistent unit of work
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub orders: Vec<Order>,
    pub withdrawals: Vec<Withdrawal>,
}

/// Point-in-time balance of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balance {
    /// Processed accrual minus everything withdrawn
    pub current: Points,
    pub withdrawn: Points,
}

impl Balance {
    pub fn accrued(&self) -> Option<Points> {
        self.current.checked_add(self.withdrawn)
    }

    pub fn covers(&self, amount: Points) -> bool {
        self.current >= amount
    }
}
