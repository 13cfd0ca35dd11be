use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::domain::entities::user::Identity;
use crate::domain::entities::withdrawal::Withdrawal;
use crate::domain::errors::LedgerError;
use crate::domain::value_objects::points::Points;

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub current: f64,
    pub withdrawn: f64,
}

/// Withdrawal request body; `sum` is a decimal number of points
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: serde_json::Number,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: f64,
    pub processed_at: String,
}

impl From<&Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: &Withdrawal) -> Self {
        Self {
            order: withdrawal.reference.to_string(),
            sum: withdrawal.amount.as_decimal(),
            processed_at: withdrawal.processed_at.to_rfc3339(),
        }
    }
}

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.balances.balance_of(identity.user_id).await?;
    Ok(Json(BalanceResponse {
        current: balance.current.as_decimal(),
        withdrawn: balance.withdrawn.as_decimal(),
    }))
}

/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!("Rejected withdrawal body: {}", rejection);
        LedgerError::InvalidAmount(rejection.body_text())
    })?;

    let amount = Points::parse_decimal(&request.sum.to_string())
        .map_err(|e| LedgerError::InvalidAmount(e.to_string()))?;

    state
        .withdrawals
        .withdraw(identity.user_id, request.order.trim(), amount)
        .await?;
    Ok(StatusCode::OK)
}

/// GET /api/user/withdrawals
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response, ApiError> {
    let withdrawals = state.withdrawals.list_withdrawals(identity.user_id).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<WithdrawalResponse> = withdrawals.iter().map(WithdrawalResponse::from).collect();
    Ok(Json(body).into_response())
}
