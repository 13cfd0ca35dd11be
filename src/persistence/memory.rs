//! In-memory ledger store
//!
//! One mutex guards the whole state, which makes every trait call a single
//! critical section. Suitable for tests and local experiments.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::entities::balance::LedgerSnapshot;
use crate::domain::entities::order::{Order, OrderUpdate};
use crate::domain::entities::user::{User, UserId};
use crate::domain::entities::withdrawal::{NewWithdrawal, Withdrawal};
use crate::domain::repositories::ledger_store::{
    CreateUserOutcome, GuardedInsert, InsertOutcome, OrderStore, StoreError, StoreResult,
    UserStore, WithdrawalGuard, WithdrawalStore,
};
use crate::domain::value_objects::order_number::OrderNumber;

#[derive(Default)]
struct State {
    users: Vec<User>,
    /// Insertion order
    orders: Vec<Order>,
    /// Insertion order
    withdrawals: Vec<Withdrawal>,
}

impl State {
    fn snapshot(&self, owner: UserId) -> LedgerSnapshot {
        LedgerSnapshot {
            orders: self.owner_orders(owner),
            withdrawals: self
                .withdrawals
                .iter()
                .filter(|w| w.owner == owner)
                .cloned()
                .collect(),
        }
    }

    fn owner_orders(&self, owner: UserId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .rev()
            .filter(|o| o.owner == owner)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryLedgerStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> StoreResult<CreateUserOutcome> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.login == login) {
            return Ok(CreateUserOutcome::LoginTaken);
        }

        let user = User {
            id: UserId(state.users.len() as i64 + 1),
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(CreateUserOutcome::Created(user))
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.login == login).cloned())
    }
}

#[async_trait]
impl OrderStore for InMemoryLedgerStore {
    async fn insert_order(&self, order: Order) -> StoreResult<InsertOutcome> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.orders.iter().find(|o| o.number == order.number) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        state.orders.push(order.clone());
        Ok(InsertOutcome::Inserted(order))
    }

    async fn find_order(&self, number: &OrderNumber) -> StoreResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| &o.number == number).cloned())
    }

    async fn list_orders(&self, owner: UserId) -> StoreResult<Vec<Order>> {
        Ok(self.state.lock().await.owner_orders(owner))
    }

    async fn list_not_finished(&self) -> StoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn update_orders(&self, updates: &[OrderUpdate]) -> StoreResult<()> {
        let mut state = self.state.lock().await;

        // resolve every target first so a miss leaves the state untouched
        let mut targets = Vec::with_capacity(updates.len());
        for update in updates {
            let index = state
                .orders
                .iter()
                .position(|o| o.number == update.number)
                .ok_or_else(|| StoreError::Query {
                    operation: "update_orders",
                    key: update.number.to_string(),
                    message: "order not found".to_string(),
                })?;
            targets.push(index);
        }

        for (index, update) in targets.into_iter().zip(updates) {
            let order = &mut state.orders[index];
            order.status = update.status;
            order.accrual = update.accrual;
        }
        Ok(())
    }
}

#[async_trait]
impl WithdrawalStore for InMemoryLedgerStore {
    async fn ledger_snapshot(&self, owner: UserId) -> StoreResult<LedgerSnapshot> {
        Ok(self.state.lock().await.snapshot(owner))
    }

    async fn insert_withdrawal_guarded(
        &self,
        withdrawal: NewWithdrawal,
        guard: WithdrawalGuard,
    ) -> StoreResult<GuardedInsert> {
        let mut state = self.state.lock().await;
        let snapshot = state.snapshot(withdrawal.owner);
        if !guard(&snapshot) {
            return Ok(GuardedInsert::Rejected(snapshot));
        }

        let committed = Withdrawal::from(withdrawal);
        state.withdrawals.push(committed.clone());
        Ok(GuardedInsert::Committed(committed))
    }

    async fn list_withdrawals(&self, owner: UserId) -> StoreResult<Vec<Withdrawal>> {
        Ok(self.state.lock().await.snapshot(owner).withdrawals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::order::OrderStatus;
    use crate::domain::value_objects::points::Points;

    #[tokio::test]
    async fn test_users_get_distinct_ids() {
        let store = InMemoryLedgerStore::new();
        let a = store.create_user("a", "h").await.unwrap();
        let b = store.create_user("b", "h").await.unwrap();
        match (a, b) {
            (CreateUserOutcome::Created(a), CreateUserOutcome::Created(b)) => {
                assert_ne!(a.id, b.id)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            store.create_user("a", "x").await.unwrap(),
            CreateUserOutcome::LoginTaken
        );
    }

    #[tokio::test]
    async fn test_failed_batch_changes_nothing() {
        let store = InMemoryLedgerStore::new();
        let known = OrderNumber::parse("79927398713").unwrap();
        store
            .insert_order(Order::new(known.clone(), UserId(1), Utc::now()))
            .await
            .unwrap();

        let result = store
            .update_orders(&[
                OrderUpdate {
                    number: known.clone(),
                    status: OrderStatus::Processed,
                    accrual: Points::from_minor(10),
                },
                OrderUpdate {
                    number: OrderNumber::parse("12345674").unwrap(),
                    status: OrderStatus::Processed,
                    accrual: Points::from_minor(10),
                },
            ])
            .await;
        assert!(result.is_err());

        let order = store.find_order(&known).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::New);
    }
}
