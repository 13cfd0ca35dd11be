//! Database Models
//!
//! Row types for users, orders and withdrawals and their conversion into
//! domain entities. Rows that do not convert are reported as corrupt.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::entities::order::{Order, OrderStatus};
use crate::domain::entities::user::{User, UserId};
use crate::domain::entities::withdrawal::Withdrawal;
use crate::domain::repositories::ledger_store::StoreError;
use crate::domain::value_objects::order_number::OrderNumber;
use crate::domain::value_objects::points::Points;

/// User record in database
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Order record in database
#[derive(Debug, Clone, FromRow)]
pub struct OrderRecord {
    pub number: String,
    pub owner_id: i64,
    pub status: String, // "NEW", "PROCESSING", "INVALID" or "PROCESSED"
    pub accrual: i64,
    pub created_at: DateTime<Utc>,
}

/// Withdrawal record in database
#[derive(Debug, Clone, FromRow)]
pub struct WithdrawalRecord {
    pub reference: String,
    pub owner_id: i64,
    pub amount: i64,
    pub processed_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: UserId(record.id),
            login: record.login,
            password_hash: record.password_hash,
            created_at: record.created_at,
        }
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = StoreError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let number = OrderNumber::parse(&record.number).map_err(|e| StoreError::CorruptRow {
            table: "orders",
            message: e.to_string(),
        })?;
        let status: OrderStatus = record.status.parse().map_err(|e| StoreError::CorruptRow {
            table: "orders",
            message: e,
        })?;

        Ok(Order {
            number,
            owner: UserId(record.owner_id),
            status,
            accrual: Points::from_minor(record.accrual),
            created_at: record.created_at,
        })
    }
}

impl TryFrom<WithdrawalRecord> for Withdrawal {
    type Error = StoreError;

    fn try_from(record: WithdrawalRecord) -> Result<Self, Self::Error> {
        let reference =
            OrderNumber::parse(&record.reference).map_err(|e| StoreError::CorruptRow {
                table: "withdrawals",
                message: e.to_string(),
            })?;

        Ok(Withdrawal {
            reference,
            amount: Points::from_minor(record.amount),
            owner: UserId(record.owner_id),
            processed_at: record.processed_at,
        })
    }
}

/// Convert a batch of rows, failing on the first corrupt one
pub fn into_entities<R, E>(records: Vec<R>) -> Result<Vec<E>, StoreError>
where
    E: TryFrom<R, Error = StoreError>,
{
    records.into_iter().map(E::try_from).collect()
}
