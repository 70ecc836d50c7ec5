//! Success responses and request extractors.
//!
//! Handlers return `Result<ApiResponse<T>>`; payload, query and path
//! rejections become `AppError::BadRequest` so malformed requests also get an
//! envelope instead of axum's plain-text body.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use athleon_core::envelope::Envelope;

use crate::error::AppError;

/// A successful envelope response.
#[derive(Debug)]
pub struct ApiResponse<T>(pub Envelope<T>);

impl<T> ApiResponse<T> {
    /// `200 OK`.
    pub fn ok(data: T) -> Self {
        Self(Envelope::ok(data))
    }

    /// `201 Created`.
    pub fn created(data: T) -> Self {
        Self(Envelope::created(data))
    }

    /// Replace the message.
    #[must_use]
    pub fn message(self, message: impl Into<String>) -> Self {
        Self(self.0.message(message))
    }
}

impl ApiResponse<()> {
    /// `200 OK` with only a message.
    pub fn done(message: impl Into<String>) -> Self {
        Self(Envelope::empty(200, message))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self.0)).into_response()
    }
}

/// JSON body extractor with envelope rejections.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Payload<T>(pub T);

/// Query string extractor with envelope rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Path extractor with envelope rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::NotFound(rejection.body_text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_created_status_follows_envelope() {
        let response = ApiResponse::created(serde_json::json!({"id": 1})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status_code"], 201);
        assert_eq!(json["data"]["id"], 1);
    }

    #[test]
    fn test_done_has_no_data() {
        let response = ApiResponse::done("Logged out");
        assert!(response.0.data.is_none());
        assert_eq!(response.0.message, "Logged out");
    }
}
