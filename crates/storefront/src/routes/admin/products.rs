//! Product management.

use axum::extract::State;
use tracing::{info, instrument};

use athleon_core::ProductId;
use athleon_core::envelope::Page;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Product, ProductDetail, ProductInput, ProductQuery};
use crate::response::{ApiResponse, Path, Payload, Query};
use crate::state::AppState;

/// `GET /api/admin/produk`, inactive products included.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ProductQuery>,
) -> Result<ApiResponse<Page<Product>>> {
    let page = ProductRepository::new(state.pool())
        .list(&query, true)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// `GET /api/admin/produk/{id}`.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<ProductDetail>> {
    let detail = ProductRepository::new(state.pool())
        .detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    Ok(ApiResponse::ok(detail))
}

/// `POST /api/admin/produk`.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Payload(input): Payload<ProductInput>,
) -> Result<ApiResponse<ProductDetail>> {
    let input = input.normalize().map_err(AppError::Validation)?;
    let detail = ProductRepository::new(state.pool()).create(&input).await?;
    info!(product_id = %detail.product.id, "Product created");
    Ok(ApiResponse::created(detail).message("Product created"))
}

/// `PUT /api/admin/produk/{id}`.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Payload(input): Payload<ProductInput>,
) -> Result<ApiResponse<ProductDetail>> {
    let input = input.normalize().map_err(AppError::Validation)?;
    let detail = ProductRepository::new(state.pool())
        .update(id, &input)
        .await?;
    info!("Product updated");
    Ok(ApiResponse::ok(detail).message("Product updated"))
}

/// `DELETE /api/admin/produk/{id}`.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<()>> {
    ProductRepository::new(state.pool()).delete(id).await?;
    info!("Product deleted");
    Ok(ApiResponse::done("Product deleted"))
}
