// SPDX-License-Identifier: MIT OR Apache-2.0
//! REST API for dissociation queries.
//!
//! Routes:
//!
//! - `GET /dissociate/terms/{term_a}/{term_b}`
//! - `GET /dissociate/locations/{coords_a}/{coords_b}?radius=&bidirectional=`
//! - `GET /` liveness, `GET /img` static image, `GET /test_db` store diagnostics

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::{middleware, Router};
use dissociation_engine::Dissociator;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::correlation;
use crate::metrics::ServerMetrics;

pub mod dissociate;
pub mod error;
pub mod params;
pub mod status;

pub use error::{ApiError, ApiResult, INVALID_COORDINATE_MESSAGE};
pub use params::LocationParams;
pub use status::DiagnosticsReport;

/// Default maximum request body size (1MB).
const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Context shared across REST handlers.
pub struct ApiContext {
    /// Resolver over the configured store.
    pub dissociator: Dissociator,
    /// GIF served at `/img`.
    pub image_path: Option<PathBuf>,
    /// Server metrics.
    pub metrics: Option<Arc<ServerMetrics>>,
}

impl ApiContext {
    /// Create a new context around a resolver.
    #[must_use]
    pub fn new(dissociator: Dissociator) -> Self {
        Self {
            dissociator,
            image_path: None,
            metrics: None,
        }
    }

    /// Set the image served at `/img`.
    #[must_use]
    pub fn with_image_path(mut self, image_path: Option<PathBuf>) -> Self {
        self.image_path = image_path;
        self
    }

    /// Add server metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Option<Arc<ServerMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Logs and counts the outcome of a dissociation request.
    pub(crate) fn observe<T>(
        &self,
        endpoint: &'static str,
        start: Instant,
        result: &Result<T, ApiError>,
    ) {
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        if let Err(e) = result {
            if e.is_client_error() {
                tracing::info!(endpoint, error = %e.message, "Rejected request");
            } else {
                tracing::error!(endpoint, error = %e.message, "Request failed");
            }
        }

        if let Some(ref m) = self.metrics {
            if let Err(e) = result {
                if e.is_client_error() {
                    m.record_rejected(endpoint, "invalid_input");
                }
            }
            m.record_request(endpoint, result.is_ok(), latency_ms);
        }
    }
}

/// REST API configuration.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Request timeout (None = unlimited).
    pub request_timeout: Option<Duration>,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            request_timeout: None,
        }
    }
}

impl RestConfig {
    /// Create a new REST configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum body size.
    #[must_use]
    pub const fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Create the REST API router.
pub fn router(ctx: Arc<ApiContext>) -> Router {
    router_with_config(ctx, &RestConfig::default())
}

/// Create the REST API router with configuration.
pub fn router_with_config(ctx: Arc<ApiContext>, config: &RestConfig) -> Router {
    let router = Router::new()
        // Dissociation endpoints
        .route("/dissociate/terms/{term_a}/{term_b}", get(dissociate::terms))
        .route(
            "/dissociate/locations/{coords_a}/{coords_b}",
            get(dissociate::locations),
        )
        // Status endpoints
        .route("/", get(status::health))
        .route("/img", get(status::image))
        .route("/test_db", get(status::diagnostics))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .with_state(ctx);

    let router = match config.request_timeout {
        Some(timeout) => router.layer(TimeoutLayer::new(timeout)),
        None => router,
    };

    router.layer(middleware::from_fn(correlation::propagate_trace_id))
}

#[cfg(test)]
mod tests {
    use dissociation_engine::MemoryStore;

    use super::*;

    fn context() -> ApiContext {
        ApiContext::new(Dissociator::new(Arc::new(MemoryStore::new())))
    }

    #[test]
    fn test_api_context_new() {
        let ctx = context();
        assert!(ctx.image_path.is_none());
        assert!(ctx.metrics.is_none());
        assert_eq!(ctx.dissociator.max_results(), 250);
    }

    #[test]
    fn test_api_context_builders() {
        use opentelemetry::metrics::MeterProvider;
        use opentelemetry_sdk::metrics::SdkMeterProvider;

        let provider = SdkMeterProvider::builder().build();
        let metrics = Arc::new(ServerMetrics::new(provider.meter("test")));
        let ctx = context()
            .with_image_path(Some(PathBuf::from("brain.gif")))
            .with_metrics(Some(metrics));

        assert_eq!(ctx.image_path, Some(PathBuf::from("brain.gif")));
        assert!(ctx.metrics.is_some());

        ctx.observe::<()>("terms", Instant::now(), &Ok(()));
        ctx.observe::<()>("locations", Instant::now(), &Err(ApiError::bad_request("x")));
        ctx.observe::<()>("locations", Instant::now(), &Err(ApiError::internal("x")));
    }

    #[test]
    fn test_rest_config_default() {
        let config = RestConfig::default();
        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_rest_config_builder() {
        let config = RestConfig::new()
            .with_max_body_size(4096)
            .with_request_timeout(Duration::from_secs(3));
        assert_eq!(config.max_body_size, 4096);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_router_creation() {
        let _router = router(Arc::new(context()));
    }

    #[test]
    fn test_router_with_timeout_creation() {
        let config = RestConfig::new().with_request_timeout(Duration::from_secs(1));
        let _router = router_with_config(Arc::new(context()), &config);
    }
}
