//! HTTP boundary
//!
//! Thin axum layer over the ledger services: decode, call, map the result
//! to a status code. No business rules live here.

pub mod balance_handler;
pub mod order_handler;
pub mod user_handler;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::auth::require_identity;
use crate::domain::errors::{ErrorKind, LedgerError};
use crate::domain::repositories::ledger_store::LedgerStore;
use crate::domain::services::balance_calculator::BalanceCalculator;
use crate::domain::services::identity_service::IdentityService;
use crate::domain::services::order_ledger::OrderLedger;
use crate::domain::services::token_service::TokenService;
use crate::domain::services::withdrawal_service::WithdrawalService;
use crate::rate_limit::{rate_limit_middleware, AuthRateLimiter};

/// Request bodies here are tiny
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
    pub orders: Arc<OrderLedger>,
    pub balances: Arc<BalanceCalculator>,
    pub withdrawals: Arc<WithdrawalService>,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, tokens: TokenService, hash_cost: u32) -> Self
    where
        S: LedgerStore + 'static,
    {
        Self {
            identity: Arc::new(IdentityService::new(store.clone(), tokens, hash_cost)),
            orders: Arc::new(OrderLedger::new(store.clone())),
            balances: Arc::new(BalanceCalculator::new(store.clone())),
            withdrawals: Arc::new(WithdrawalService::new(store)),
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Ledger error on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(error: LedgerError) -> Self {
        ApiError(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match (&self.0, self.0.kind()) {
            (LedgerError::IncorrectFormat(_) | LedgerError::InvalidAmount(_), _) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::Conflict) => StatusCode::CONFLICT,
            (_, ErrorKind::Auth) => StatusCode::UNAUTHORIZED,
            (_, ErrorKind::InsufficientFunds) => StatusCode::PAYMENT_REQUIRED,
            (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Assemble the full API router
pub fn build_router(state: AppState, auth_limiter: AuthRateLimiter) -> Router {
    let credential_routes = Router::new()
        .route("/api/user/register", post(user_handler::register))
        .route("/api/user/login", post(user_handler::login))
        .layer(middleware::from_fn(move |request: Request, next: Next| {
            rate_limit_middleware(auth_limiter.clone(), request, next)
        }));

    let account_routes = Router::new()
        .route(
            "/api/user/orders",
            post(order_handler::upload_order).get(order_handler::list_orders),
        )
        .route("/api/user/balance", get(balance_handler::get_balance))
        .route("/api/user/balance/withdraw", post(balance_handler::withdraw))
        .route("/api/user/withdrawals", get(balance_handler::list_withdrawals))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_identity));

    Router::new()
        .merge(credential_routes)
        .merge(account_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (LedgerError::LoginEmpty, StatusCode::BAD_REQUEST),
            (LedgerError::PasswordEmpty, StatusCode::BAD_REQUEST),
            (LedgerError::LoginBusy("a".into()), StatusCode::CONFLICT),
            (LedgerError::Unauthorized, StatusCode::UNAUTHORIZED),
            (LedgerError::IncorrectFormat("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (LedgerError::InvalidAmount("0".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (LedgerError::ConflictOtherOwner("0".into()), StatusCode::CONFLICT),
            (
                LedgerError::InsufficientFunds {
                    requested: 2,
                    available: 1,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (LedgerError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).status(), status);
        }
    }
}
