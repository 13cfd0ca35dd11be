use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::application::handlers::{ApiError, AppState};
use crate::domain::errors::LedgerError;

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware for authenticated routes.
///
/// Resolves the bearer token to a live user and stores the resulting
/// `Identity` in the request extensions for the handlers.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = match header.and_then(bearer_token) {
        Some(token) => token.to_string(),
        None => {
            tracing::debug!("Missing or malformed Authorization header");
            return Err(ApiError(LedgerError::Unauthorized));
        }
    };

    let identity = state.identity.authenticate(&token).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
