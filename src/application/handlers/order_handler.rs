use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::domain::entities::order::{AdmitOutcome, Order};
use crate::domain::entities::user::Identity;

/// Single order in API response
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
    pub uploaded_at: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number.to_string(),
            status: order.status.to_string(),
            accrual: order
                .accrual
                .is_positive()
                .then(|| order.accrual.as_decimal()),
            uploaded_at: order.created_at.to_rfc3339(),
        }
    }
}

/// POST /api/user/orders, plain-text order number body
pub async fn upload_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: String,
) -> Result<StatusCode, ApiError> {
    match state.orders.admit(identity.user_id, body.trim()).await? {
        AdmitOutcome::Created(_) => Ok(StatusCode::ACCEPTED),
        AdmitOutcome::AlreadyExistsSameOwner(_) => Ok(StatusCode::OK),
    }
}

/// GET /api/user/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response, ApiError> {
    let orders = state.orders.list_orders(identity.user_id).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderResponse> = orders.iter().map(OrderResponse::from).collect();
    Ok(Json(body).into_response())
}
