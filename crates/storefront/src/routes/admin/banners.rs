//! Banner management.

use axum::extract::State;
use tracing::instrument;

use athleon_core::BannerId;

use crate::db::BannerRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Banner, BannerInput};
use crate::response::{ApiResponse, Path, Payload};
use crate::state::AppState;

/// `GET /api/admin/banners`, inactive banners included.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<ApiResponse<Vec<Banner>>> {
    let banners = BannerRepository::new(state.pool()).list(false).await?;
    Ok(ApiResponse::ok(banners))
}

/// `POST /api/admin/banners`.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Payload(input): Payload<BannerInput>,
) -> Result<ApiResponse<Banner>> {
    let input = input.normalize().map_err(AppError::Validation)?;
    let banner = BannerRepository::new(state.pool()).create(&input).await?;
    Ok(ApiResponse::created(banner).message("Banner created"))
}

/// `PUT /api/admin/banners/{id}`.
#[instrument(skip_all, fields(admin_id = %admin.id, banner_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<BannerId>,
    Payload(input): Payload<BannerInput>,
) -> Result<ApiResponse<Banner>> {
    let input = input.normalize().map_err(AppError::Validation)?;
    let banner = BannerRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(ApiResponse::ok(banner).message("Banner updated"))
}

/// `DELETE /api/admin/banners/{id}`.
#[instrument(skip_all, fields(admin_id = %admin.id, banner_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<BannerId>,
) -> Result<ApiResponse<()>> {
    BannerRepository::new(state.pool()).delete(id).await?;
    Ok(ApiResponse::done("Banner deleted"))
}
