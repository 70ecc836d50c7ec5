//! User management.

use axum::extract::State;
use serde::Deserialize;
use tracing::{info, instrument};

use athleon_core::envelope::Page;
use athleon_core::{UserId, UserRole};

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::response::{ApiResponse, Path, Payload, Query};
use crate::state::AppState;

/// `GET /api/admin/users` query.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Name or email search.
    pub q: Option<String>,
}

/// `PUT /api/admin/users/{id}/role`.
#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: UserRole,
}

/// `GET /api/admin/users`.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<UserQuery>,
) -> Result<ApiResponse<Page<User>>> {
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let page = UserRepository::new(state.pool())
        .list(query.page, query.per_page, search)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// `PUT /api/admin/users/{id}/role`.
///
/// Admins cannot change their own role.
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Payload(input): Payload<RoleUpdate>,
) -> Result<ApiResponse<User>> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot change your own role".to_owned(),
        ));
    }
    let user = UserRepository::new(state.pool())
        .set_role(id, input.role)
        .await?;
    info!(role = ?user.role, "User role changed");
    Ok(ApiResponse::ok(user).message("Role updated"))
}
