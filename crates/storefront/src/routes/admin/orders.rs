//! Order management.

use axum::extract::State;
use tracing::instrument;

use athleon_core::OrderId;
use athleon_core::envelope::Page;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::OrderDetail;
use crate::response::{ApiResponse, Path, Payload, Query};
use crate::services::orders::{Actor, AdminOrderQuery, OrderService, StatusUpdate};
use crate::state::AppState;

/// `GET /api/admin/pesanan?status&q`.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<AdminOrderQuery>,
) -> Result<ApiResponse<Page<OrderDetail>>> {
    let page = OrderService::new(state.pool()).list_all(&query).await?;
    Ok(ApiResponse::ok(page))
}

/// `GET /api/admin/pesanan/{id}`.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse<OrderDetail>> {
    let detail = OrderService::new(state.pool()).detail(None, id).await?;
    Ok(ApiResponse::ok(detail))
}

/// `PUT /api/admin/pesanan/{id}/status`.
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id, status = %input.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Payload(input): Payload<StatusUpdate>,
) -> Result<ApiResponse<OrderDetail>> {
    let detail = OrderService::new(state.pool())
        .change_status(
            Actor::Admin,
            None,
            id,
            input.status,
            input.airway_bill.as_deref(),
        )
        .await?;
    let message = format!("Order is now {}", detail.status_label);
    Ok(ApiResponse::ok(detail).message(message))
}
