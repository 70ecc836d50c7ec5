//! Authentication route handlers.
//!
//! Register and login hand out a bearer token; logout revokes the token the
//! request was made with.

use axum::extract::State;
use serde::Serialize;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{BearerToken, RequireCustomer};
use crate::models::{CurrentUser, User};
use crate::response::{ApiResponse, Payload};
use crate::services::auth::{AuthService, LoginInput, RegisterInput};
use crate::state::AppState;

/// A freshly issued session.
#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
    pub token_type: &'static str,
}

impl AuthSession {
    fn new((user, token): (User, String)) -> Self {
        set_sentry_user(&user.id, Some(user.email.as_str()));
        Self {
            user,
            token,
            token_type: "Bearer",
        }
    }
}

/// `POST /api/auth/register`.
#[instrument(skip(state, input))]
pub async fn register(
    State(state): State<AppState>,
    Payload(input): Payload<RegisterInput>,
) -> Result<ApiResponse<AuthSession>> {
    let issued = AuthService::new(state.pool()).register(input).await?;
    tracing::info!(user_id = %issued.0.id, "User registered");
    Ok(ApiResponse::created(AuthSession::new(issued)).message("Registration successful"))
}

/// `POST /api/auth/login`.
#[instrument(skip(state, input))]
pub async fn login(
    State(state): State<AppState>,
    Payload(input): Payload<LoginInput>,
) -> Result<ApiResponse<AuthSession>> {
    let issued = AuthService::new(state.pool()).login(&input).await?;
    Ok(ApiResponse::ok(AuthSession::new(issued)).message("Login successful"))
}

/// `POST /api/auth/logout`.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<ApiResponse<()>> {
    AuthService::new(state.pool()).logout(&token).await?;
    clear_sentry_user();
    Ok(ApiResponse::done("Logged out"))
}

/// `GET /api/auth/me`.
pub async fn me(RequireCustomer(user): RequireCustomer) -> ApiResponse<CurrentUser> {
    ApiResponse::ok(user)
}
