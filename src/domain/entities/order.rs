use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::domain::entities::user::UserId;
use crate::domain::value_objects::order_number::OrderNumber;
use crate::domain::value_objects::points::Points;

/// Accrual processing state of an order.
///
/// `New -> Processing -> {Processed, Invalid}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub const NOT_FINISHED: [OrderStatus; 2] = [OrderStatus::New, OrderStatus::Processing];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    fn stage(&self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Invalid | OrderStatus::Processed => 2,
        }
    }

    /// Whether moving to `next` goes forward along
    /// `New -> Processing -> {Processed, Invalid}`
    pub fn advances_to(&self, next: OrderStatus) -> bool {
        next.stage() > self.stage()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// Admitted purchase order.
///
/// Only the reconciliation worker mutates `status` and `accrual`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub number: OrderNumber,
    pub owner: UserId,
    pub status: OrderStatus,
    pub accrual: Points,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(number: OrderNumber, owner: UserId, created_at: DateTime<Utc>) -> Self {
        Order {
            number,
            owner,
            status: OrderStatus::New,
            accrual: Points::ZERO,
            created_at,
        }
    }
}

/// Status/accrual change staged by the reconciliation worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub accrual: Points,
}

/// Result of a successful admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmitOutcome {
    Created(Order),
    /// Same owner posted this number before; nothing was written.
    AlreadyExistsSameOwner(Order),
}
