use chrono::{DateTime, Utc};

use crate::domain::entities::user::UserId;
use crate::domain::value_objects::order_number::OrderNumber;
use crate::domain::value_objects::points::Points;

/// Committed withdrawal. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    /// Checksum-valid reference label; need not match any admitted order
    pub reference: OrderNumber,
    pub amount: Points,
    pub owner: UserId,
    pub processed_at: DateTime<Utc>,
}

/// Withdrawal request handed to the store for a guarded insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWithdrawal {
    pub reference: OrderNumber,
    pub amount: Points,
    pub owner: UserId,
    pub processed_at: DateTime<Utc>,
}

impl From<NewWithdrawal> for Withdrawal {
    fn from(new: NewWithdrawal) -> Self {
        Withdrawal {
            reference: new.reference,
            amount: new.amount,
            owner: new.owner,
            processed_at: new.processed_at,
        }
    }
}
