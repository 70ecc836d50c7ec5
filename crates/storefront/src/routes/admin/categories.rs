//! Category management. Writes invalidate the public category cache.

use axum::extract::State;
use tracing::{info, instrument};

use athleon_core::CategoryId;

use crate::db::CategoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryInput};
use crate::response::{ApiResponse, Path, Payload};
use crate::routes::catalog::cached_categories;
use crate::state::AppState;

/// `GET /api/admin/kategori`.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<ApiResponse<Vec<Category>>> {
    Ok(ApiResponse::ok(cached_categories(&state).await?.to_vec()))
}

/// `POST /api/admin/kategori`.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Payload(input): Payload<CategoryInput>,
) -> Result<ApiResponse<Category>> {
    let input = input.normalize().map_err(AppError::Validation)?;
    let category = CategoryRepository::new(state.pool()).create(&input).await?;
    state.categories().invalidate(&()).await;
    info!(category_id = %category.id, "Category created");
    Ok(ApiResponse::created(category).message("Category created"))
}

/// `PUT /api/admin/kategori/{id}`.
#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Payload(input): Payload<CategoryInput>,
) -> Result<ApiResponse<Category>> {
    let input = input.normalize().map_err(AppError::Validation)?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &input)
        .await?;
    state.categories().invalidate(&()).await;
    Ok(ApiResponse::ok(category).message("Category updated"))
}

/// `DELETE /api/admin/kategori/{id}`.
///
/// Products in the category are kept, uncategorized.
#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<ApiResponse<()>> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    state.categories().invalidate(&()).await;
    info!("Category deleted");
    Ok(ApiResponse::done("Category deleted"))
}
