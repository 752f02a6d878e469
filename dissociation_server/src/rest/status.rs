// SPDX-License-Identifier: MIT OR Apache-2.0
//! Liveness, static image and store diagnostics endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use dissociation_engine::CorpusDiagnostics;
use serde::Serialize;

use crate::rest::error::ApiError;
use crate::rest::ApiContext;

/// Rows sampled from each table by `/test_db`.
pub const DIAGNOSTIC_SAMPLE_SIZE: usize = 3;

/// Body of `/test_db`. Counts and samples are flattened into the top level.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    /// Whether every diagnostic query succeeded.
    pub ok: bool,
    /// Counts and samples, present on success.
    #[serde(flatten)]
    pub diagnostics: Option<CorpusDiagnostics>,
    /// Failure message, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe.
pub async fn health() -> Html<&'static str> {
    Html("<p>Server working!</p>")
}

/// Serves the configured GIF.
pub async fn image(State(ctx): State<Arc<ApiContext>>) -> Result<Response, ApiError> {
    let Some(path) = ctx.image_path.as_ref() else {
        return Err(ApiError::not_found("Image not configured"));
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/gif")], bytes).into_response()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read image");
            Err(ApiError::not_found("Image not available"))
        },
    }
}

/// Row counts and small samples of each corpus table.
pub async fn diagnostics(State(ctx): State<Arc<ApiContext>>) -> Response {
    let start = Instant::now();
    let store = ctx.dissociator.store();

    let (status, report) = match store.diagnostics(DIAGNOSTIC_SAMPLE_SIZE).await {
        Ok(diagnostics) => (
            StatusCode::OK,
            DiagnosticsReport {
                ok: true,
                diagnostics: Some(diagnostics),
                error: None,
            },
        ),
        Err(e) => {
            tracing::error!(backend = %store.backend(), error = %e, "Store diagnostics failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                DiagnosticsReport {
                    ok: false,
                    diagnostics: None,
                    error: Some(e.to_string()),
                },
            )
        },
    };

    if let Some(ref m) = ctx.metrics {
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        m.record_request("test_db", report.ok, latency_ms);
    }

    (status, Json(report)).into_response()
}
