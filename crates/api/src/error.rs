use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use matchcast_models::MatchcastError;
use tracing::error;

use crate::routes::ApiResponse;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized".to_string(),
        }
    }
}

impl From<MatchcastError> for ApiError {
    fn from(err: MatchcastError) -> Self {
        match err {
            MatchcastError::FixtureNotFound { fixture_id } => {
                Self::not_found(format!("Fixture {fixture_id} not found"))
            }
            other => {
                error!(error = %other, "request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: other.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            message: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}
