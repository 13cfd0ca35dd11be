use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loyalty_ledger::application::actors::accrual_worker::AccrualWorker;
use loyalty_ledger::application::handlers::{build_router, AppState};
use loyalty_ledger::config::LedgerConfig;
use loyalty_ledger::domain::services::token_service::TokenService;
use loyalty_ledger::infrastructure::accrual_client::HttpAccrualClient;
use loyalty_ledger::persistence::{init_database, SqliteLedgerStore};
use loyalty_ledger::rate_limit::{create_rate_limiter, RateLimiterConfig};
use loyalty_ledger::secrets::load_token_secret;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loyalty_ledger=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = LedgerConfig::from_env();
    info!("Loyalty ledger starting on {}", config.run_address);

    let secret = load_token_secret()?;
    let tokens = TokenService::new(secret.as_bytes(), config.token_config());
    drop(secret);

    let pool = init_database(&config.database_url, config.database_max_connections).await?;
    let store = Arc::new(SqliteLedgerStore::new(pool.clone()));

    let oracle = Arc::new(HttpAccrualClient::new(
        &config.accrual_address,
        config.request_timeout(),
    )?);
    let worker = AccrualWorker::spawn(store.clone(), oracle, config.worker_config());
    info!(
        "Accrual worker polling {} every {:?}",
        config.accrual_address,
        config.poll_interval()
    );

    let state = AppState::new(store, tokens, config.password_hash_cost);
    let limiter = create_rate_limiter(RateLimiterConfig {
        requests_per_minute: config.auth_requests_per_minute,
    });
    let app = build_router(state, limiter);

    let listener = TcpListener::bind(config.run_address).await?;
    info!("✓ Listening on {}", config.run_address);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("HTTP server stopped, stopping accrual worker");
    worker.stop().await;
    pool.close().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
