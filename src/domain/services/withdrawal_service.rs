//! Withdrawal Service
//!
//! The balance check runs inside the store's guarded insert, so two
//! concurrent withdrawals for one owner can never both pass against a
//! balance only one of them can afford.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::entities::balance::LedgerSnapshot;
use crate::domain::entities::user::UserId;
use crate::domain::entities::withdrawal::{NewWithdrawal, Withdrawal};
use crate::domain::errors::LedgerError;
use crate::domain::repositories::ledger_store::{GuardedInsert, WithdrawalGuard, WithdrawalStore};
use crate::domain::services::balance_calculator::compute;
use crate::domain::value_objects::order_number::OrderNumber;
use crate::domain::value_objects::points::Points;

pub struct WithdrawalService {
    store: Arc<dyn WithdrawalStore>,
}

impl WithdrawalService {
    pub fn new(store: Arc<dyn WithdrawalStore>) -> Self {
        Self { store }
    }

    pub async fn withdraw(
        &self,
        owner: UserId,
        reference: &str,
        amount: Points,
    ) -> Result<Withdrawal, LedgerError> {
        let reference = OrderNumber::parse(reference)?;
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount.to_string()));
        }

        let request = NewWithdrawal {
            reference,
            amount,
            owner,
            processed_at: Utc::now(),
        };
        let guard: WithdrawalGuard = Arc::new(move |snapshot: &LedgerSnapshot| {
            matches!(compute(snapshot), Ok(balance) if balance.covers(amount))
        });

        match self.store.insert_withdrawal_guarded(request, guard).await? {
            GuardedInsert::Committed(withdrawal) => {
                info!(
                    "User {} withdrew {} against {}",
                    owner, withdrawal.amount, withdrawal.reference
                );
                Ok(withdrawal)
            }
            GuardedInsert::Rejected(snapshot) => {
                let available = compute(&snapshot)?.current;
                debug!(
                    "Withdrawal of {} refused for user {}: {} available",
                    amount, owner, available
                );
                Err(LedgerError::InsufficientFunds {
                    requested: amount.minor(),
                    available: available.minor(),
                })
            }
        }
    }

    /// Oldest first
    pub async fn list_withdrawals(&self, owner: UserId) -> Result<Vec<Withdrawal>, LedgerError> {
        Ok(self.store.list_withdrawals(owner).await?)
    }
}
