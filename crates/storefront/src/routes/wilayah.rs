//! Region lookup route handlers for the address form.

use axum::extract::State;

use crate::error::Result;
use crate::response::{ApiResponse, Path};
use crate::services::wilayah::{Level, Region};
use crate::state::AppState;

/// `GET /api/wilayah/provinces`.
pub async fn provinces(State(state): State<AppState>) -> Result<ApiResponse<Vec<Region>>> {
    let regions = state.wilayah().provinces().await?;
    Ok(ApiResponse::ok(regions.to_vec()))
}

/// `GET /api/wilayah/cities/{province}`.
pub async fn cities(
    State(state): State<AppState>,
    Path(province): Path<String>,
) -> Result<ApiResponse<Vec<Region>>> {
    children(&state, Level::Regency, &province).await
}

/// `GET /api/wilayah/districts/{city}`.
pub async fn districts(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<ApiResponse<Vec<Region>>> {
    children(&state, Level::District, &city).await
}

/// `GET /api/wilayah/villages/{district}`.
pub async fn villages(
    State(state): State<AppState>,
    Path(district): Path<String>,
) -> Result<ApiResponse<Vec<Region>>> {
    children(&state, Level::Village, &district).await
}

async fn children(
    state: &AppState,
    level: Level,
    parent_code: &str,
) -> Result<ApiResponse<Vec<Region>>> {
    let regions = state.wilayah().children(level, parent_code).await?;
    Ok(ApiResponse::ok(regions.to_vec()))
}
