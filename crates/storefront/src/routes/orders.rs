//! Customer order route handlers and public shipment tracking.

use axum::extract::State;
use serde::Deserialize;

use athleon_core::envelope::{FieldErrors, Page};
use athleon_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::order::OrderQuery;
use crate::models::{OrderDetail, ReviewInput};
use crate::response::{ApiResponse, Path, Payload, Query};
use crate::services::binderbyte::Tracking;
use crate::services::orders::{Actor, OrderService};
use crate::state::AppState;

/// `GET /api/tracking` query.
#[derive(Debug, Deserialize)]
pub struct TrackingQuery {
    #[serde(default)]
    pub courier: String,
    #[serde(default)]
    pub awb: String,
}

impl TrackingQuery {
    fn validate(&self) -> Result<(&str, &str)> {
        let courier = self.courier.trim();
        let awb = self.awb.trim();
        let mut errors = FieldErrors::new();
        errors.check(courier.is_empty(), "courier", "courier is required");
        errors.check(awb.is_empty(), "awb", "airway bill is required");
        errors.into_result().map_err(AppError::Validation)?;
        Ok((courier, awb))
    }
}

/// `GET /api/customer/pesanan`.
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Query(query): Query<OrderQuery>,
) -> Result<ApiResponse<Page<OrderDetail>>> {
    let page = OrderService::new(state.pool())
        .list_for_customer(user.id, &query)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// `GET /api/customer/pesanan/{id}`.
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse<OrderDetail>> {
    let detail = OrderService::new(state.pool())
        .detail(Some(user.id), id)
        .await?;
    Ok(ApiResponse::ok(detail))
}

/// `POST /api/customer/pesanan/{id}/cancel`.
pub async fn cancel(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse<OrderDetail>> {
    let detail = OrderService::new(state.pool())
        .change_status(Actor::Customer, Some(user.id), id, OrderStatus::Dibatalkan, None)
        .await?;
    Ok(ApiResponse::ok(detail).message("Order cancelled"))
}

/// `POST /api/customer/pesanan/{id}/complete`.
pub async fn complete(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse<OrderDetail>> {
    let detail = OrderService::new(state.pool())
        .change_status(Actor::Customer, Some(user.id), id, OrderStatus::Selesai, None)
        .await?;
    Ok(ApiResponse::ok(detail).message("Order received"))
}

/// `POST /api/customer/pesanan/{id}/review`.
pub async fn review(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<OrderId>,
    Payload(input): Payload<ReviewInput>,
) -> Result<ApiResponse<OrderDetail>> {
    let detail = OrderService::new(state.pool())
        .review(user.id, id, input)
        .await?;
    Ok(ApiResponse::ok(detail).message("Thank you for your review"))
}

/// `GET /api/customer/pesanan/{id}/tracking`.
pub async fn tracking(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse<Tracking>> {
    let tracking = OrderService::new(state.pool())
        .tracking(state.binderbyte(), user.id, id)
        .await?;
    Ok(ApiResponse::ok(tracking))
}

/// `GET /api/tracking?courier&awb`.
pub async fn track(
    State(state): State<AppState>,
    Query(query): Query<TrackingQuery>,
) -> Result<ApiResponse<Tracking>> {
    let (courier, awb) = query.validate()?;
    let tracking = state.binderbyte().track(courier, awb).await?;
    Ok(ApiResponse::ok(tracking))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_query_requires_both_fields() {
        let query = TrackingQuery {
            courier: " jne ".to_owned(),
            awb: String::new(),
        };
        let Err(AppError::Validation(errors)) = query.validate() else {
            panic!("expected validation error");
        };
        assert!(errors.get("awb").is_some());
        assert!(errors.get("courier").is_none());

        let query = TrackingQuery {
            courier: " jne ".to_owned(),
            awb: "JT123".to_owned(),
        };
        assert_eq!(query.validate().unwrap(), ("jne", "JT123"));
    }
}
