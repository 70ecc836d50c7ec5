//! Public catalog route handlers: products, categories and banners.

use std::sync::Arc;

use axum::extract::State;
use tracing::{instrument, warn};

use athleon_core::ProductId;
use athleon_core::envelope::Page;

use crate::db::{BannerRepository, CategoryRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::models::{Banner, Category, Product, ProductDetail, ProductQuery};
use crate::response::{ApiResponse, Path, Query};
use crate::state::AppState;

/// How many related products a detail page shows.
const RECOMMENDED_LIMIT: u32 = 8;

/// `GET /api/produk`.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<ApiResponse<Page<Product>>> {
    let page = ProductRepository::new(state.pool())
        .list(&query, false)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// `GET /api/produk/{id}`.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<ProductDetail>> {
    let detail = ProductRepository::new(state.pool())
        .detail(id)
        .await?
        .filter(|d| d.product.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    Ok(ApiResponse::ok(detail))
}

/// `GET /api/produk/{id}/recommended`.
///
/// A failed lookup is logged and answered with an empty list.
#[instrument(skip(state))]
pub async fn recommended(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<Vec<Product>>> {
    let products = ProductRepository::new(state.pool());
    let product = products
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;

    let related = match products.recommended(&product, RECOMMENDED_LIMIT).await {
        Ok(related) => related,
        Err(e) => {
            warn!(error = %e, "Recommended products unavailable");
            Vec::new()
        }
    };
    Ok(ApiResponse::ok(related))
}

/// `GET /api/kategori`.
pub async fn categories(State(state): State<AppState>) -> Result<ApiResponse<Vec<Category>>> {
    Ok(ApiResponse::ok(cached_categories(&state).await?.to_vec()))
}

/// The category list, from cache when fresh.
pub(crate) async fn cached_categories(state: &AppState) -> Result<Arc<Vec<Category>>> {
    if let Some(categories) = state.categories().get(&()).await {
        return Ok(categories);
    }
    let categories = Arc::new(CategoryRepository::new(state.pool()).list().await?);
    state
        .categories()
        .insert((), Arc::clone(&categories))
        .await;
    Ok(categories)
}

/// `GET /api/banners`.
pub async fn banners(State(state): State<AppState>) -> Result<ApiResponse<Vec<Banner>>> {
    let banners = BannerRepository::new(state.pool()).list(true).await?;
    Ok(ApiResponse::ok(banners))
}
