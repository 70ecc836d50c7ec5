//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error leaves as an envelope: `{status_code, message, errors?}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use athleon_core::TransitionError;
use athleon_core::checkout::CheckoutError;
use athleon_core::envelope::{Envelope, FieldErrors};
use athleon_core::variant::SelectionError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::binderbyte::TrackingError;
use crate::services::biteship::BiteshipError;
use crate::services::midtrans::MidtransError;
use crate::services::wilayah::WilayahError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// A checkout step was rejected.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// A variant selection was rejected.
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// An order status change was rejected.
    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Midtrans API operation failed.
    #[error("Midtrans error: {0}")]
    Midtrans(#[from] MidtransError),

    /// Biteship API operation failed.
    #[error("Biteship error: {0}")]
    Biteship(#[from] BiteshipError),

    /// Courier tracking failed.
    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    /// Region lookup failed.
    #[error("Region error: {0}")]
    Wilayah(#[from] WilayahError),

    /// Request payload failed validation.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A single-field validation error.
    #[must_use]
    pub fn invalid(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    /// Whether this is our failure rather than the client's.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(err) => !matches!(
                err,
                RepositoryError::NotFound | RepositoryError::Conflict(_)
            ),
            Self::Auth(err) => matches!(err, AuthError::Repository(_) | AuthError::PasswordHash),
            Self::Tracking(err) => !matches!(err, TrackingError::NotFound),
            Self::Wilayah(err) => !matches!(err, WilayahError::InvalidCode(_)),
            Self::Midtrans(_) | Self::Biteship(_) | Self::Internal(_) => true,
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::Validation(_) | AuthError::UserAlreadyExists => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::InProgress | CheckoutError::Completed => StatusCode::CONFLICT,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::Selection(_) | Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Transition(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Midtrans(_) | Self::Biteship(_) => StatusCode::BAD_GATEWAY,
            Self::Tracking(err) => match err {
                TrackingError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Wilayah(err) => match err {
                WilayahError::InvalidCode(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message and field errors.
    fn public_parts(self) -> (String, FieldErrors) {
        // Don't expose internal error details to clients
        let message = match self {
            Self::Database(RepositoryError::NotFound) => "Resource not found".to_owned(),
            Self::Database(RepositoryError::Conflict(msg)) => msg,
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Auth(err) => match err {
                AuthError::Validation(errors) => return validation_parts(errors),
                AuthError::InvalidCredentials => "Invalid credentials".to_owned(),
                AuthError::UserAlreadyExists => {
                    let mut errors = FieldErrors::new();
                    errors.add("email", "an account with this email already exists");
                    return validation_parts(errors);
                }
                _ => "Authentication error".to_owned(),
            },
            Self::Validation(errors) => return validation_parts(errors),
            Self::Checkout(err) => err.to_string(),
            Self::Selection(err) => err.to_string(),
            Self::Transition(err) => err.to_string(),
            Self::Tracking(TrackingError::NotFound) => {
                "Tracking information not found".to_owned()
            }
            Self::Wilayah(WilayahError::InvalidCode(code)) => {
                format!("Invalid region code: {code}")
            }
            Self::Midtrans(_) | Self::Biteship(_) | Self::Tracking(_) | Self::Wilayah(_) => {
                "External service error".to_owned()
            }
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg,
            Self::RateLimited => "Too many requests".to_owned(),
        };
        (message, FieldErrors::new())
    }
}

fn validation_parts(errors: FieldErrors) -> (String, FieldErrors) {
    let message = errors
        .first_message()
        .unwrap_or("The given data was invalid")
        .to_owned();
    (message, errors)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let (message, errors) = self.public_parts();
        let body = Envelope::empty(status.as_u16(), message).with_errors(errors);

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Selected shipping", Some(&[("courier", "jne")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::MissingAreaId)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::Completed)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Selection(SelectionError::EmptyQuantity)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Tracking(TrackingError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Biteship(BiteshipError::Parse("x".to_string()))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let json = body_json(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(json["status_code"], 500);
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_validation_body_has_field_errors() {
        let json = body_json(AppError::invalid("quantity", "quantity must be at least 1")).await;
        assert_eq!(json["status_code"], 422);
        assert_eq!(json["message"], "quantity must be at least 1");
        assert_eq!(json["errors"]["quantity"][0], "quantity must be at least 1");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_field_error() {
        let json = body_json(AppError::Auth(AuthError::UserAlreadyExists)).await;
        assert_eq!(json["status_code"], 422);
        assert!(json["errors"]["email"].is_array());
    }

    #[tokio::test]
    async fn test_conflict_message_passes_through() {
        let json = body_json(AppError::Database(RepositoryError::Conflict(
            "Sepatu: only 1 left in stock".to_string(),
        )))
        .await;
        assert_eq!(json["status_code"], 409);
        assert_eq!(json["message"], "Sepatu: only 1 left in stock");
    }
}
