use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, ErrorResponse};
use crate::domain::errors::LedgerError;

/// Register/login request body
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

fn bad_body(rejection: JsonRejection) -> Response {
    tracing::debug!("Rejected credentials body: {}", rejection);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: rejection.body_text(),
        }),
    )
        .into_response()
}

fn token_response(token: String) -> Result<Response, ApiError> {
    let header = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
        tracing::error!("Issued token is not a valid header value: {}", e);
        ApiError(LedgerError::Internal)
    })?;
    Ok(([(AUTHORIZATION, header)], Json(TokenResponse { token })).into_response())
}

/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(credentials) = match body {
        Ok(body) => body,
        Err(rejection) => return Ok(bad_body(rejection)),
    };

    let token = state
        .identity
        .register(&credentials.login, &credentials.password)
        .await?;
    token_response(token)
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(credentials) = match body {
        Ok(body) => body,
        Err(rejection) => return Ok(bad_body(rejection)),
    };

    let token = state
        .identity
        .login(&credentials.login, &credentials.password)
        .await?;
    token_response(token)
}
