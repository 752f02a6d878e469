// SPDX-License-Identifier: MIT OR Apache-2.0
//! REST API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dissociation_engine::{DissociationError, StoreError};
use serde::{Deserialize, Serialize};

/// Message returned for a malformed `x_y_z` token.
pub const INVALID_COORDINATE_MESSAGE: &str =
    "Invalid coordinate format. Use x_y_z (e.g., '0_-52_26').";

/// API error response, serialized as `{"error": message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP status code.
    #[serde(skip)]
    pub code: u16,
    /// Human-readable error message.
    #[serde(rename = "error")]
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    #[must_use]
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// Create an internal server error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// Whether the client sent a malformed request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_connection() {
            Self::internal(format!("Database connection failed: {err}"))
        } else {
            Self::internal(format!("Query failed: {err}"))
        }
    }
}

impl From<DissociationError> for ApiError {
    fn from(err: DissociationError) -> Self {
        match err {
            err @ DissociationError::InvalidCoordinate { .. } => {
                Self::bad_request(format!("{INVALID_COORDINATE_MESSAGE} {err}"))
            },
            DissociationError::Store(e) => e.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code {
            400 => StatusCode::BAD_REQUEST,
            404 => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Result type for REST API handlers.
pub type ApiResult<T> = Result<Json<T>, ApiError>;
