//! Payment route handlers.
//!
//! The notification endpoint is called by Midtrans, not by customers: it is
//! unauthenticated and trusts only the signature in the body.

use axum::extract::State;
use serde::Deserialize;
use tracing::instrument;

use athleon_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireCustomer;
use crate::models::OrderDetail;
use crate::response::{ApiResponse, Payload};
use crate::services::payment::{PaymentService, SnapToken};
use crate::state::AppState;

/// Body of the customer payment endpoints.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub order_id: OrderId,
}

/// `POST /api/customer/payment/create-token`.
pub async fn create_token(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Payload(input): Payload<PaymentRequest>,
) -> Result<ApiResponse<SnapToken>> {
    let token = PaymentService::new(&state)
        .create_token(&user, input.order_id)
        .await?;
    Ok(ApiResponse::ok(token))
}

/// `POST /api/customer/payment/check-status`.
pub async fn check_status(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Payload(input): Payload<PaymentRequest>,
) -> Result<ApiResponse<OrderDetail>> {
    let detail = PaymentService::new(&state)
        .check_status(&user, input.order_id)
        .await?;
    let message = format!("Order status: {}", detail.status_label);
    Ok(ApiResponse::ok(detail).message(message))
}

/// `POST /api/payment/notification`.
///
/// Answers 200 for notifications that are valid but change nothing, so the
/// gateway stops retrying them.
#[instrument(skip_all)]
pub async fn notification(
    State(state): State<AppState>,
    Payload(raw): Payload<serde_json::Value>,
) -> Result<ApiResponse<()>> {
    let applied = PaymentService::new(&state).handle_notification(raw).await?;
    Ok(ApiResponse::done(if applied.is_some() {
        "Notification processed"
    } else {
        "Notification ignored"
    }))
}
