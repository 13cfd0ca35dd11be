//! Accrual Oracle Trait
//!
//! The external system that decides how many points an order earns. Its
//! answers are untrusted: every failure mode is a per-order, retryable error.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::entities::order::OrderStatus;
use crate::domain::value_objects::order_number::OrderNumber;
use crate::domain::value_objects::points::Points;

pub type OracleResult<T> = Result<T, OracleError>;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("order is not registered with the accrual system")]
    NotRegistered,

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Status vocabulary of the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl OracleStatus {
    pub fn to_order_status(self) -> OrderStatus {
        match self {
            // registered but not picked up yet
            OracleStatus::Registered => OrderStatus::New,
            OracleStatus::Processing => OrderStatus::Processing,
            OracleStatus::Invalid => OrderStatus::Invalid,
            OracleStatus::Processed => OrderStatus::Processed,
        }
    }
}

impl FromStr for OracleStatus {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTERED" => Ok(OracleStatus::Registered),
            "PROCESSING" => Ok(OracleStatus::Processing),
            "INVALID" => Ok(OracleStatus::Invalid),
            "PROCESSED" => Ok(OracleStatus::Processed),
            other => Err(OracleError::Malformed(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OracleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OracleStatus::Registered => "REGISTERED",
            OracleStatus::Processing => "PROCESSING",
            OracleStatus::Invalid => "INVALID",
            OracleStatus::Processed => "PROCESSED",
        };
        f.write_str(s)
    }
}

/// One oracle answer, already converted to internal units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleReport {
    pub status: OracleStatus,
    pub accrual: Points,
}

#[async_trait]
pub trait AccrualOracle: Send + Sync {
    async fn fetch_status(&self, number: &OrderNumber) -> OracleResult<OracleReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_status_mapping() {
        assert_eq!(
            "REGISTERED".parse::<OracleStatus>().unwrap().to_order_status(),
            OrderStatus::New
        );
        assert_eq!(
            "PROCESSING".parse::<OracleStatus>().unwrap().to_order_status(),
            OrderStatus::Processing
        );
        assert_eq!(
            "INVALID".parse::<OracleStatus>().unwrap().to_order_status(),
            OrderStatus::Invalid
        );
        assert_eq!(
            "PROCESSED".parse::<OracleStatus>().unwrap().to_order_status(),
            OrderStatus::Processed
        );
    }

    #[test]
    fn test_unknown_oracle_status_is_malformed() {
        assert!(matches!(
            "DONE".parse::<OracleStatus>(),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            "processed".parse::<OracleStatus>(),
            Err(OracleError::Malformed(_))
        ));
    }
}
