//! Persistence Layer
//!
//! SQLite storage for users, orders and withdrawals via sqlx, plus an
//! in-memory store with the same contract.
//!
//! # Database Schema
//!
//! ## Users Table
//! - id: Integer primary key
//! - login: Unique, never renamed
//! - password_hash: bcrypt hash
//! - created_at: Timestamp
//!
//! ## Orders Table
//! - id: Integer primary key (insertion order)
//! - number: Luhn-valid digit string, globally unique
//! - owner_id: Foreign key to users
//! - status: "NEW", "PROCESSING", "INVALID" or "PROCESSED"
//! - accrual: Integer minor units
//! - created_at: Timestamp
//!
//! ## Withdrawals Table
//! - id: Integer primary key
//! - reference: Luhn-valid label, not tied to any order
//! - owner_id: Foreign key to users
//! - amount: Positive integer minor units
//! - processed_at: Timestamp

pub mod memory;
pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub use memory::InMemoryLedgerStore;
pub use repository::SqliteLedgerStore;

/// Database connection pool
pub type DbPool = SqlitePool;

/// How long a writer waits on SQLite's lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Initialize the database connection pool
///
/// # Arguments
/// - `database_url`: SQLite URL (e.g., "sqlite://data/ledger.db")
/// - `max_connections`: Pool size
///
/// # Errors
/// Returns error if database connection fails or migrations fail
pub async fn init_database(database_url: &str, max_connections: u32) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
                })?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

/// Run database migrations. Every statement is idempotent.
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    let statements: [(&str, &str); 6] = [
        (
            "users table",
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                login TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at DATETIME NOT NULL
            )
            "#,
        ),
        (
            "orders table",
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                number TEXT NOT NULL UNIQUE,
                owner_id INTEGER NOT NULL,
                status TEXT NOT NULL
                    CHECK(status IN ('NEW', 'PROCESSING', 'INVALID', 'PROCESSED')),
                accrual INTEGER NOT NULL DEFAULT 0 CHECK(accrual >= 0),
                created_at DATETIME NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id)
            )
            "#,
        ),
        (
            "withdrawals table",
            r#"
            CREATE TABLE IF NOT EXISTS withdrawals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reference TEXT NOT NULL,
                owner_id INTEGER NOT NULL,
                amount INTEGER NOT NULL CHECK(amount > 0),
                processed_at DATETIME NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id)
            )
            "#,
        ),
        (
            "orders owner index",
            "CREATE INDEX IF NOT EXISTS idx_orders_owner ON orders(owner_id, created_at)",
        ),
        (
            "orders status index",
            "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
        ),
        (
            "withdrawals owner index",
            "CREATE INDEX IF NOT EXISTS idx_withdrawals_owner ON withdrawals(owner_id, processed_at)",
        ),
    ];

    for (name, sql) in statements {
        sqlx::query(sql).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to create {}: {}", name, e))
        })?;
    }

    info!("✓ Database migrations completed successfully");

    Ok(())
}
