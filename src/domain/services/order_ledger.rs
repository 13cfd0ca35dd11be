//! Order Ledger
//!
//! Admits purchase orders and lists them per owner. Uniqueness of order
//! numbers is left to the store; a duplicate insert comes back with the
//! row that already holds the number and is classified here.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::entities::order::{AdmitOutcome, Order};
use crate::domain::entities::user::UserId;
use crate::domain::errors::LedgerError;
use crate::domain::repositories::ledger_store::{InsertOutcome, OrderStore};
use crate::domain::value_objects::order_number::OrderNumber;

pub struct OrderLedger {
    orders: Arc<dyn OrderStore>,
}

impl OrderLedger {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// Admit an order number for `owner`
    ///
    /// # Returns
    /// `Created` for a fresh number, `AlreadyExistsSameOwner` when the owner
    /// posted it before. A number owned by someone else is `ConflictOtherOwner`.
    pub async fn admit(&self, owner: UserId, raw: &str) -> Result<AdmitOutcome, LedgerError> {
        let number = OrderNumber::parse(raw)?;

        let order = Order::new(number, owner, Utc::now());
        match self.orders.insert_order(order).await? {
            InsertOutcome::Inserted(order) => {
                info!("Order {} admitted for user {}", order.number, owner);
                Ok(AdmitOutcome::Created(order))
            }
            InsertOutcome::Existing(existing) if existing.owner == owner => {
                debug!("Order {} already posted by user {}", existing.number, owner);
                Ok(AdmitOutcome::AlreadyExistsSameOwner(existing))
            }
            InsertOutcome::Existing(existing) => {
                warn!(
                    "User {} tried to post order {} owned by user {}",
                    owner, existing.number, existing.owner
                );
                Err(LedgerError::ConflictOtherOwner(existing.number.to_string()))
            }
        }
    }

    /// Newest first; an empty list is a normal result
    pub async fn list_orders(&self, owner: UserId) -> Result<Vec<Order>, LedgerError> {
        Ok(self.orders.list_orders(owner).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::order::OrderStatus;
    use crate::persistence::memory::InMemoryLedgerStore;

    fn ledger() -> (OrderLedger, Arc<InMemoryLedgerStore>) {
        let store = Arc::new(InMemoryLedgerStore::new());
        (OrderLedger::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_admit_creates_new_order() {
        let (ledger, _) = ledger();
        let outcome = ledger.admit(UserId(1), "79927398713").await.unwrap();
        match outcome {
            AdmitOutcome::Created(order) => {
                assert_eq!(order.number.as_str(), "79927398713");
                assert_eq!(order.owner, UserId(1));
                assert_eq!(order.status, OrderStatus::New);
            }
            other => panic!("expected Created, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admit_same_owner_is_idempotent() {
        let (ledger, store) = ledger();
        ledger.admit(UserId(1), "79927398713").await.unwrap();

        for _ in 0..2 {
            let outcome = ledger.admit(UserId(1), "79927398713").await.unwrap();
            assert!(matches!(outcome, AdmitOutcome::AlreadyExistsSameOwner(_)));
        }
        assert_eq!(store.list_orders(UserId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admit_other_owner_conflicts_without_mutation() {
        let (ledger, store) = ledger();
        ledger.admit(UserId(1), "79927398713").await.unwrap();

        let result = ledger.admit(UserId(2), "79927398713").await;
        assert_eq!(
            result,
            Err(LedgerError::ConflictOtherOwner("79927398713".to_string()))
        );

        let number = OrderNumber::parse("79927398713").unwrap();
        let stored = store.find_order(&number).await.unwrap().unwrap();
        assert_eq!(stored.owner, UserId(1));
        assert!(store.list_orders(UserId(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admit_rejects_bad_numbers_before_storage() {
        let (ledger, store) = ledger();
        for raw in ["", "abc", "79927398710", "7992 7398713"] {
            assert!(matches!(
                ledger.admit(UserId(1), raw).await,
                Err(LedgerError::IncorrectFormat(_))
            ));
        }
        assert!(store.list_orders(UserId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let (ledger, _) = ledger();
        ledger.admit(UserId(1), "79927398713").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ledger.admit(UserId(1), "12345674").await.unwrap();

        let listed = ledger.list_orders(UserId(1)).await.unwrap();
        let numbers: Vec<&str> = listed.iter().map(|o| o.number.as_str()).collect();
        assert_eq!(numbers, vec!["12345674", "79927398713"]);
        assert!(ledger.list_orders(UserId(9)).await.unwrap().is_empty());
    }
}
