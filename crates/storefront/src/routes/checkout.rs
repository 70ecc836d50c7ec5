//! Checkout route handlers.
//!
//! A checkout is started from the cart or a buy-now selection and then driven
//! step by step through its id. Every step answers with the full summary.

use axum::extract::State;
use uuid::Uuid;

use athleon_core::checkout::CheckoutOutcome;

use crate::error::Result;
use crate::middleware::RequireCustomer;
use crate::response::{ApiResponse, Path, Payload};
use crate::services::checkout::{
    CheckoutService, CheckoutSummary, SelectAddress, SelectPayment, SelectShipping, StartCheckout,
};
use crate::state::AppState;

/// `POST /api/customer/checkout`.
pub async fn start(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Payload(input): Payload<StartCheckout>,
) -> Result<ApiResponse<CheckoutSummary>> {
    let summary = CheckoutService::new(&state).start(&user, input).await?;
    Ok(ApiResponse::created(summary))
}

/// `GET /api/customer/checkout/{id}/summary`.
pub async fn summary(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<CheckoutSummary>> {
    let summary = CheckoutService::new(&state).summary(&user, id).await?;
    Ok(ApiResponse::ok(summary))
}

/// `PUT /api/customer/checkout/{id}/address`.
pub async fn select_address(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<Uuid>,
    Payload(input): Payload<SelectAddress>,
) -> Result<ApiResponse<CheckoutSummary>> {
    let summary = CheckoutService::new(&state)
        .select_address(&user, id, input.address_id)
        .await?;
    let message = summary
        .warning
        .clone()
        .unwrap_or_else(|| "Address selected".to_owned());
    Ok(ApiResponse::ok(summary).message(message))
}

/// `GET /api/customer/checkout/{id}/shipping-rates`.
pub async fn shipping_rates(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<CheckoutSummary>> {
    let summary = CheckoutService::new(&state)
        .shipping_rates(&user, id)
        .await?;
    Ok(ApiResponse::ok(summary))
}

/// `PUT /api/customer/checkout/{id}/shipping`.
pub async fn select_shipping(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<Uuid>,
    Payload(input): Payload<SelectShipping>,
) -> Result<ApiResponse<CheckoutSummary>> {
    let summary = CheckoutService::new(&state)
        .select_shipping(&user, id, &input)
        .await?;
    Ok(ApiResponse::ok(summary))
}

/// `PUT /api/customer/checkout/{id}/payment-method`.
pub async fn select_payment(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<Uuid>,
    Payload(input): Payload<SelectPayment>,
) -> Result<ApiResponse<CheckoutSummary>> {
    let summary = CheckoutService::new(&state)
        .select_payment(&user, id, input.payment_method)
        .await?;
    Ok(ApiResponse::ok(summary))
}

/// `POST /api/customer/checkout/{id}/process`.
pub async fn process(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<CheckoutOutcome>> {
    let outcome = CheckoutService::new(&state).process(&user, id).await?;
    let message = match outcome {
        CheckoutOutcome::Redirect { .. } => "Order created, continue to payment",
        CheckoutOutcome::Created { .. } => "Order created",
    };
    Ok(ApiResponse::created(outcome).message(message))
}
