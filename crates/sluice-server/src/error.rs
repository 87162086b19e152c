//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::job::JobId;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The submitted configuration or request body is invalid.
    #[error("{0}")]
    BadRequest(String),

    /// The referenced job does not exist.
    #[error("job not found: {0}")]
    JobNotFound(JobId),
}

impl ApiError {
    /// Wraps a validation failure as a 400.
    pub fn bad_request(error: impl std::fmt::Display) -> Self {
        Self::BadRequest(error.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::JobNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            ok: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_maps_to_400() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_job_not_found_maps_to_404() {
        let response = ApiError::JobNotFound(JobId::generate()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
