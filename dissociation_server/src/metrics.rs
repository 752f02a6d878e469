// SPDX-License-Identifier: MIT OR Apache-2.0
//! OpenTelemetry metrics integration.
//!
//! Counters and latency histograms per endpoint, exported over OTLP.

use std::sync::Arc;

use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::metrics::SdkMeterProvider;

use crate::error::{Result, ServerError};

const METER_NAME: &str = "dissociation_server";

/// Configuration for metrics collection.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are exported.
    pub enabled: bool,
    /// OTLP endpoint URL for exporting metrics.
    pub otlp_endpoint: String,
    /// Service name for metrics identification.
    pub service_name: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: METER_NAME.to_string(),
        }
    }
}

impl MetricsConfig {
    /// Create a new metrics configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable metrics export.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the OTLP endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }
}

/// Server metrics collection.
pub struct ServerMetrics {
    meter: Meter,
    /// Total number of requests received.
    pub requests_total: Counter<u64>,
    /// Number of successful requests.
    pub requests_success: Counter<u64>,
    /// Number of failed requests.
    pub requests_error: Counter<u64>,
    /// Requests rejected for malformed input before reaching the store.
    pub requests_rejected: Counter<u64>,
    /// Request latency histogram in milliseconds.
    pub request_latency: Histogram<f64>,
}

impl ServerMetrics {
    /// Create a new metrics instance.
    #[must_use]
    pub fn new(meter: Meter) -> Self {
        let requests_total = meter
            .u64_counter("dissociate.requests.total")
            .with_description("Total number of requests received")
            .build();

        let requests_success = meter
            .u64_counter("dissociate.requests.success")
            .with_description("Number of successful requests")
            .build();

        let requests_error = meter
            .u64_counter("dissociate.requests.error")
            .with_description("Number of failed requests")
            .build();

        let requests_rejected = meter
            .u64_counter("dissociate.requests.rejected")
            .with_description("Number of requests rejected for malformed input")
            .build();

        let request_latency = meter
            .f64_histogram("dissociate.request.latency_ms")
            .with_description("Request latency in milliseconds")
            .build();

        Self {
            meter,
            requests_total,
            requests_success,
            requests_error,
            requests_rejected,
            request_latency,
        }
    }

    /// Record a request with its outcome.
    pub fn record_request(&self, endpoint: &str, success: bool, latency_ms: f64) {
        let attrs = [KeyValue::new("endpoint", endpoint.to_string())];

        self.requests_total.add(1, &attrs);
        if success {
            self.requests_success.add(1, &attrs);
        } else {
            self.requests_error.add(1, &attrs);
        }
        self.request_latency.record(latency_ms, &attrs);
    }

    /// Record a request rejected for malformed input.
    pub fn record_rejected(&self, endpoint: &str, reason: &str) {
        let attrs = [
            KeyValue::new("endpoint", endpoint.to_string()),
            KeyValue::new("reason", reason.to_string()),
        ];
        self.requests_rejected.add(1, &attrs);
    }

    /// Get the underlying meter for custom metrics.
    #[must_use]
    pub fn meter(&self) -> &Meter {
        &self.meter
    }
}

/// Holder for the meter provider, keeps the metrics pipeline alive.
pub struct MetricsHandle {
    provider: SdkMeterProvider,
    metrics: Arc<ServerMetrics>,
}

impl MetricsHandle {
    /// Get a reference to the server metrics.
    #[must_use]
    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    /// Shutdown the metrics pipeline, flushing any pending data.
    pub fn shutdown(self) -> Result<()> {
        self.provider
            .shutdown()
            .map_err(|e| ServerError::Internal(format!("metrics shutdown failed: {e}")))
    }
}

/// Initialize the metrics pipeline.
///
/// Returns a handle that must be kept alive for the duration of metrics collection.
/// When disabled, instruments are still created but nothing is exported.
pub fn init_metrics(config: &MetricsConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        let provider = SdkMeterProvider::builder().build();
        let meter = provider.meter(METER_NAME);
        let metrics = Arc::new(ServerMetrics::new(meter));
        return Ok(MetricsHandle { provider, metrics });
    }

    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .map_err(|e| ServerError::Config(format!("failed to create OTLP exporter: {e}")))?;

    let provider = SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .build();

    let meter = provider.meter(METER_NAME);
    let metrics = Arc::new(ServerMetrics::new(meter));

    tracing::info!(
        endpoint = %config.otlp_endpoint,
        service = %config.service_name,
        "Metrics initialized"
    );

    Ok(MetricsHandle { provider, metrics })
}
