//! Database Repository
//!
//! SQLite implementation of the ledger store traits.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use tracing::{debug, error, warn};

use super::models::{into_entities, OrderRecord, UserRecord, WithdrawalRecord};
use super::DbPool;
use crate::domain::entities::balance::LedgerSnapshot;
use crate::domain::entities::order::{Order, OrderUpdate};
use crate::domain::entities::user::{User, UserId};
use crate::domain::entities::withdrawal::{NewWithdrawal, Withdrawal};
use crate::domain::repositories::ledger_store::{
    CreateUserOutcome, GuardedInsert, InsertOutcome, OrderStore, StoreError, StoreResult,
    UserStore, WithdrawalGuard, WithdrawalStore,
};
use crate::domain::value_objects::order_number::OrderNumber;

const ORDER_COLUMNS: &str = "number, owner_id, status, accrual, created_at";
const WITHDRAWAL_COLUMNS: &str = "reference, owner_id, amount, processed_at";

/// Ledger store backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: DbPool,
}

impl SqliteLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Wrap a sqlx failure with the operation and key it happened on
fn store_error(operation: &'static str, key: impl ToString) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        let key = key.to_string();
        error!("{} failed for '{}': {}", operation, key, e);
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Query {
                operation,
                key,
                message: other.to_string(),
            },
        }
    }
}

async fn fetch_order(conn: &mut SqliteConnection, number: &str) -> StoreResult<Option<Order>> {
    let record = sqlx::query_as::<_, OrderRecord>(&format!(
        "SELECT {} FROM orders WHERE number = ?1",
        ORDER_COLUMNS
    ))
    .bind(number)
    .fetch_optional(conn)
    .await
    .map_err(store_error("find_order", number))?;

    record.map(Order::try_from).transpose()
}

async fn fetch_owner_orders(conn: &mut SqliteConnection, owner: UserId) -> StoreResult<Vec<Order>> {
    let records = sqlx::query_as::<_, OrderRecord>(&format!(
        "SELECT {} FROM orders WHERE owner_id = ?1 ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    ))
    .bind(owner.0)
    .fetch_all(conn)
    .await
    .map_err(store_error("list_orders", owner))?;

    into_entities(records)
}

async fn fetch_owner_withdrawals(
    conn: &mut SqliteConnection,
    owner: UserId,
) -> StoreResult<Vec<Withdrawal>> {
    let records = sqlx::query_as::<_, WithdrawalRecord>(&format!(
        "SELECT {} FROM withdrawals WHERE owner_id = ?1 ORDER BY processed_at ASC, id ASC",
        WITHDRAWAL_COLUMNS
    ))
    .bind(owner.0)
    .fetch_all(conn)
    .await
    .map_err(store_error("list_withdrawals", owner))?;

    into_entities(records)
}

async fn fetch_snapshot(conn: &mut SqliteConnection, owner: UserId) -> StoreResult<LedgerSnapshot> {
    let orders = fetch_owner_orders(&mut *conn, owner).await?;
    let withdrawals = fetch_owner_withdrawals(&mut *conn, owner).await?;
    Ok(LedgerSnapshot {
        orders,
        withdrawals,
    })
}

/// Body of the guarded insert; runs inside an open `BEGIN IMMEDIATE`
async fn guarded_insert(
    conn: &mut SqliteConnection,
    withdrawal: NewWithdrawal,
    guard: &WithdrawalGuard,
) -> StoreResult<GuardedInsert> {
    let snapshot = fetch_snapshot(&mut *conn, withdrawal.owner).await?;
    if !guard(&snapshot) {
        return Ok(GuardedInsert::Rejected(snapshot));
    }

    sqlx::query(
        "INSERT INTO withdrawals (reference, owner_id, amount, processed_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(withdrawal.reference.as_str())
    .bind(withdrawal.owner.0)
    .bind(withdrawal.amount.minor())
    .bind(withdrawal.processed_at)
    .execute(&mut *conn)
    .await
    .map_err(store_error("insert_withdrawal", withdrawal.owner))?;

    Ok(GuardedInsert::Committed(Withdrawal::from(withdrawal)))
}

/// One full `BEGIN IMMEDIATE` .. `COMMIT`/`ROLLBACK` cycle on a pooled
/// connection. If the transaction cannot be closed, the connection is
/// detached from the pool and closed, which makes SQLite roll it back.
async fn run_guarded_withdrawal(
    pool: DbPool,
    withdrawal: NewWithdrawal,
    guard: WithdrawalGuard,
) -> StoreResult<GuardedInsert> {
    let owner = withdrawal.owner;
    let mut conn = pool
        .acquire()
        .await
        .map_err(store_error("insert_withdrawal", owner))?;

    // IMMEDIATE takes SQLite's write lock up front, so the snapshot read
    // below cannot go stale before the insert commits.
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .map_err(store_error("insert_withdrawal", owner))?;

    let outcome = guarded_insert(&mut conn, withdrawal, &guard).await;
    let finish = if matches!(outcome, Ok(GuardedInsert::Committed(_))) {
        "COMMIT"
    } else {
        "ROLLBACK"
    };

    match sqlx::query(finish).execute(&mut *conn).await {
        Ok(_) => outcome,
        Err(e) => {
            error!(
                "{} of withdrawal for user {} failed, discarding connection: {}",
                finish, owner, e
            );
            if let Err(close_err) = conn.detach().close().await {
                warn!("Closing discarded connection failed: {}", close_err);
            }
            match outcome {
                Ok(GuardedInsert::Committed(_)) => Err(store_error("insert_withdrawal", owner)(e)),
                other => other,
            }
        }
    }
}

#[async_trait]
impl UserStore for SqliteLedgerStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> StoreResult<CreateUserOutcome> {
        let result = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (login, password_hash, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, login, password_hash, created_at
            "#,
        )
        .bind(login)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => {
                debug!("Created user {} ({})", record.login, record.id);
                Ok(CreateUserOutcome::Created(record.into()))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(CreateUserOutcome::LoginTaken)
            }
            Err(e) => Err(store_error("create_user", login)(e)),
        }
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, login, password_hash, created_at FROM users WHERE login = ?1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error("find_user_by_login", login))?;

        Ok(record.map(Into::into))
    }
}

#[async_trait]
impl OrderStore for SqliteLedgerStore {
    async fn insert_order(&self, order: Order) -> StoreResult<InsertOutcome> {
        let number = order.number.as_str();
        let inserted = sqlx::query_as::<_, OrderRecord>(&format!(
            r#"
            INSERT INTO orders (number, owner_id, status, accrual, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(number) DO NOTHING
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(number)
        .bind(order.owner.0)
        .bind(order.status.as_str())
        .bind(order.accrual.minor())
        .bind(order.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error("insert_order", number))?;

        if let Some(record) = inserted {
            return Ok(InsertOutcome::Inserted(Order::try_from(record)?));
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(store_error("insert_order", number))?;
        match fetch_order(&mut conn, number).await? {
            Some(existing) => Ok(InsertOutcome::Existing(existing)),
            None => Err(StoreError::Query {
                operation: "insert_order",
                key: number.to_string(),
                message: "conflicting row disappeared".to_string(),
            }),
        }
    }

    async fn find_order(&self, number: &OrderNumber) -> StoreResult<Option<Order>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(store_error("find_order", number))?;
        fetch_order(&mut conn, number.as_str()).await
    }

    async fn list_orders(&self, owner: UserId) -> StoreResult<Vec<Order>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(store_error("list_orders", owner))?;
        fetch_owner_orders(&mut conn, owner).await
    }

    async fn list_not_finished(&self) -> StoreResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {} FROM orders WHERE status IN ('NEW', 'PROCESSING') ORDER BY created_at ASC, id ASC",
            ORDER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error("list_not_finished", "*"))?;

        into_entities(records)
    }

    async fn update_orders(&self, updates: &[OrderUpdate]) -> StoreResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_error("update_orders", "begin"))?;

        for update in updates {
            let key = update.number.as_str();
            let rows_affected = sqlx::query("UPDATE orders SET status = ?1, accrual = ?2 WHERE number = ?3")
                .bind(update.status.as_str())
                .bind(update.accrual.minor())
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(store_error("update_orders", key))?
                .rows_affected();

            if rows_affected == 0 {
                // dropping `tx` rolls back the whole batch
                return Err(StoreError::Query {
                    operation: "update_orders",
                    key: key.to_string(),
                    message: "order not found".to_string(),
                });
            }
        }

        tx.commit()
            .await
            .map_err(store_error("update_orders", "commit"))?;

        debug!("Applied {} order updates", updates.len());
        Ok(())
    }
}

#[async_trait]
impl WithdrawalStore for SqliteLedgerStore {
    async fn ledger_snapshot(&self, owner: UserId) -> StoreResult<LedgerSnapshot> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_error("ledger_snapshot", owner))?;
        let snapshot = fetch_snapshot(&mut *tx, owner).await?;
        tx.commit()
            .await
            .map_err(store_error("ledger_snapshot", owner))?;
        Ok(snapshot)
    }

    async fn insert_withdrawal_guarded(
        &self,
        withdrawal: NewWithdrawal,
        guard: WithdrawalGuard,
    ) -> StoreResult<GuardedInsert> {
        let owner = withdrawal.owner;

        // Owned task: dropping this future must not leave BEGIN without COMMIT/ROLLBACK
        tokio::spawn(run_guarded_withdrawal(self.pool.clone(), withdrawal, guard))
            .await
            .map_err(|e| {
                error!("Withdrawal task for user {} did not finish: {}", owner, e);
                StoreError::Query {
                    operation: "insert_withdrawal",
                    key: owner.to_string(),
                    message: e.to_string(),
                }
            })?
    }

    async fn list_withdrawals(&self, owner: UserId) -> StoreResult<Vec<Withdrawal>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(store_error("list_withdrawals", owner))?;
        fetch_owner_withdrawals(&mut conn, owner).await
    }
}
