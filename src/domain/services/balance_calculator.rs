//! Balance Calculator - derives balances from source rows on every call

use std::sync::Arc;
use tracing::error;

use crate::domain::entities::balance::{Balance, LedgerSnapshot};
use crate::domain::entities::order::OrderStatus;
use crate::domain::entities::user::UserId;
use crate::domain::errors::LedgerError;
use crate::domain::repositories::ledger_store::WithdrawalStore;
use crate::domain::value_objects::points::Points;

/// `current` counts only processed accrual; `withdrawn` is every withdrawal.
///
/// Sums that leave the i64 range are reported as `Internal`.
pub fn compute(snapshot: &LedgerSnapshot) -> Result<Balance, LedgerError> {
    let accrued = Points::checked_sum(
        snapshot
            .orders
            .iter()
            .filter(|order| order.status == OrderStatus::Processed)
            .map(|order| order.accrual),
    );
    let withdrawn = Points::checked_sum(snapshot.withdrawals.iter().map(|w| w.amount));

    let balance = match (accrued, withdrawn) {
        (Some(accrued), Some(withdrawn)) => accrued
            .checked_sub(withdrawn)
            .map(|current| Balance { current, withdrawn }),
        _ => None,
    };

    balance.ok_or_else(|| {
        error!(
            "Balance overflow over {} orders and {} withdrawals",
            snapshot.orders.len(),
            snapshot.withdrawals.len()
        );
        LedgerError::Internal
    })
}

pub struct BalanceCalculator {
    store: Arc<dyn WithdrawalStore>,
}

impl BalanceCalculator {
    pub fn new(store: Arc<dyn WithdrawalStore>) -> Self {
        Self { store }
    }

    pub async fn balance_of(&self, owner: UserId) -> Result<Balance, LedgerError> {
        let snapshot = self.store.ledger_snapshot(owner).await?;
        compute(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::order::Order;
    use crate::domain::entities::withdrawal::Withdrawal;
    use crate::domain::value_objects::order_number::OrderNumber;
    use chrono::Utc;

    fn order(number: &str, status: OrderStatus, accrual: i64) -> Order {
        let mut order = Order::new(OrderNumber::parse(number).unwrap(), UserId(1), Utc::now());
        order.status = status;
        order.accrual = Points::from_minor(accrual);
        order
    }

    fn withdrawal(amount: i64) -> Withdrawal {
        Withdrawal {
            reference: OrderNumber::parse("12345674").unwrap(),
            amount: Points::from_minor(amount),
            owner: UserId(1),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_snapshot_is_zero() {
        assert_eq!(compute(&LedgerSnapshot::default()), Ok(Balance::default()));
    }

    #[test]
    fn test_only_processed_orders_count() {
        let snapshot = LedgerSnapshot {
            orders: vec![
                order("79927398713", OrderStatus::Processed, 10_000),
                order("12345674", OrderStatus::Processing, 700),
                order("4561261212345467", OrderStatus::Invalid, 300),
                order("0", OrderStatus::New, 0),
            ],
            withdrawals: vec![withdrawal(2_500), withdrawal(1_500)],
        };

        let balance = compute(&snapshot).unwrap();
        assert_eq!(balance.current, Points::from_minor(6_000));
        assert_eq!(balance.withdrawn, Points::from_minor(4_000));
        assert_eq!(balance.accrued(), Some(Points::from_minor(10_000)));
        assert!(balance.covers(Points::from_minor(6_000)));
        assert!(!balance.covers(Points::from_minor(6_001)));
    }

    #[test]
    fn test_oversized_accruals_are_internal_not_a_panic() {
        let huge = 5_000_000_000_000_000_000;
        let snapshot = LedgerSnapshot {
            orders: vec![
                order("79927398713", OrderStatus::Processed, huge),
                order("12345674", OrderStatus::Processed, huge),
            ],
            withdrawals: vec![],
        };
        assert_eq!(compute(&snapshot), Err(LedgerError::Internal));

        let snapshot = LedgerSnapshot {
            orders: vec![order("79927398713", OrderStatus::Processed, huge)],
            withdrawals: vec![withdrawal(i64::MAX), withdrawal(1)],
        };
        assert_eq!(compute(&snapshot), Err(LedgerError::Internal));
    }
}
