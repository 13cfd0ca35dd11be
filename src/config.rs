use std::fmt::Display;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use crate::application::actors::accrual_worker::WorkerConfig;
use crate::domain::services::token_service::{SigningAlgorithm, TokenConfig};

/// Runtime configuration for the ledger service
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub run_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub accrual_address: String,
    pub accrual_poll_interval_seconds: u64, // also the tick deadline
    pub accrual_request_timeout_milliseconds: u64,
    pub token_algorithm: SigningAlgorithm,
    pub token_ttl_seconds: Option<u64>, // None = tokens never expire
    pub password_hash_cost: u32,
    pub auth_requests_per_minute: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            run_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database_url: "sqlite://data/ledger.db".to_string(),
            database_max_connections: 5,
            accrual_address: "http://localhost:8081".to_string(),
            accrual_poll_interval_seconds: 5,
            accrual_request_timeout_milliseconds: 2000,
            token_algorithm: SigningAlgorithm::Hs256,
            token_ttl_seconds: None,
            password_hash_cost: bcrypt::DEFAULT_COST,
            auth_requests_per_minute: 60,
        }
    }
}

/// Parse `raw` and keep it only if it lands in `range`
fn parse_in_range<T>(name: &str, raw: &str, range: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) if range.contains(&value) => Some(value),
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {} (must be between {} and {}), using default",
                name,
                value,
                range.start(),
                range.end()
            );
            None
        }
        Err(e) => {
            tracing::warn!("Failed to parse {} '{}': {}, using default", name, raw, e);
            None
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> LedgerConfig {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> LedgerConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LedgerConfig::default();

        if let Some(address) = lookup("RUN_ADDRESS") {
            match address.trim().parse::<SocketAddr>() {
                Ok(value) => config.run_address = value,
                Err(e) => tracing::warn!(
                    "Failed to parse RUN_ADDRESS '{}': {}, using default: {}",
                    address,
                    e,
                    config.run_address
                ),
            }
        }

        if let Some(url) = lookup("DATABASE_URI") {
            if url.trim().is_empty() {
                tracing::warn!("DATABASE_URI is empty, using default: {}", config.database_url);
            } else {
                config.database_url = url.trim().to_string();
            }
        }

        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            if let Some(value) = parse_in_range("DATABASE_MAX_CONNECTIONS", &raw, 1..=100) {
                config.database_max_connections = value;
            }
        }

        if let Some(address) = lookup("ACCRUAL_SYSTEM_ADDRESS") {
            match url::Url::parse(address.trim()) {
                Ok(_) => config.accrual_address = address.trim().to_string(),
                Err(e) => tracing::warn!(
                    "Failed to parse ACCRUAL_SYSTEM_ADDRESS '{}': {}, using default: {}",
                    address,
                    e,
                    config.accrual_address
                ),
            }
        }

        if let Some(raw) = lookup("ACCRUAL_POLL_INTERVAL_SECONDS") {
            if let Some(value) = parse_in_range("ACCRUAL_POLL_INTERVAL_SECONDS", &raw, 1..=3600) {
                config.accrual_poll_interval_seconds = value;
            }
        }

        if let Some(raw) = lookup("ACCRUAL_REQUEST_TIMEOUT_MILLISECONDS") {
            if let Some(value) =
                parse_in_range("ACCRUAL_REQUEST_TIMEOUT_MILLISECONDS", &raw, 100..=60000)
            {
                config.accrual_request_timeout_milliseconds = value;
            }
        }

        if let Some(raw) = lookup("TOKEN_ALGORITHM") {
            match raw.parse::<SigningAlgorithm>() {
                Ok(value) => config.token_algorithm = value,
                Err(e) => tracing::warn!("Invalid TOKEN_ALGORITHM '{}': {}, using HS256", raw, e),
            }
        }

        if let Some(raw) = lookup("TOKEN_TTL_SECONDS") {
            config.token_ttl_seconds = parse_in_range("TOKEN_TTL_SECONDS", &raw, 1..=31_536_000);
        }

        if let Some(raw) = lookup("PASSWORD_HASH_COST") {
            if let Some(value) = parse_in_range("PASSWORD_HASH_COST", &raw, 4..=31) {
                config.password_hash_cost = value;
            }
        }

        if let Some(raw) = lookup("AUTH_REQUESTS_PER_MINUTE") {
            if let Some(value) = parse_in_range("AUTH_REQUESTS_PER_MINUTE", &raw, 1..=100_000) {
                config.auth_requests_per_minute = value;
            }
        }

        config
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.accrual_poll_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.accrual_request_timeout_milliseconds)
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            algorithm: self.token_algorithm,
            ttl: self.token_ttl_seconds.map(Duration::from_secs),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: self.poll_interval(),
        }
    }
}
