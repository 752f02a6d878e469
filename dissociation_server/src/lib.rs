// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dissociation HTTP Server
//!
//! This crate serves dissociation queries over a neuroimaging study corpus.
//! It supports:
//!
//! - Term dissociation (studies tagged with one term but not another)
//! - Spatial dissociation (studies near one location but not another)
//! - PostgreSQL/PostGIS or in-memory JSON corpus storage
//! - Request correlation IDs, structured logging and OTLP metrics
//! - Graceful shutdown on SIGINT/SIGTERM
//!
//! # Example
//!
//! ```ignore
//! use dissociation_server::{DissociationServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_env()?;
//!     let server = DissociationServer::from_config(config)?;
//!     server.serve().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rustdoc::broken_intra_doc_links
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::future_not_send)]
#![allow(clippy::significant_drop_tightening)]

pub mod config;
pub mod correlation;
pub mod error;
pub mod metrics;
pub mod rest;
pub mod signals;

use std::future::{Future, IntoFuture};
use std::sync::Arc;

use dissociation_engine::{
    Dissociator, MemoryStore, PgStore, QueryTracker, StudyStore, TrackedStore,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub use config::{ServerConfig, StoreSource};
pub use correlation::{extract_or_generate, request_span, TraceId, TRACE_ID_HEADER};
pub use error::{Result, ServerError};
pub use metrics::{init_metrics, MetricsConfig, MetricsHandle, ServerMetrics};
pub use rest::{ApiContext, ApiError, RestConfig};

/// Open the store named by `source`.
///
/// PostgreSQL pools are created lazily; the first request opens a connection.
pub fn open_store(source: Option<&StoreSource>) -> Result<Arc<dyn StudyStore>> {
    let Some(source) = source else {
        return Err(ServerError::Config(config::MISSING_STORE_MESSAGE.to_string()));
    };
    tracing::info!(store = source.kind(), "Opening study store");

    match source {
        StoreSource::Postgres(pg) => {
            tracing::info!(schema = %pg.schema, "Using PostgreSQL store");
            Ok(Arc::new(PgStore::connect_lazy(pg)?))
        },
        StoreSource::Corpus(path) => {
            tracing::info!(path = %path.display(), "Using in-memory corpus store");
            Ok(Arc::new(MemoryStore::from_json_path(path)?))
        },
    }
}

/// The dissociation HTTP server.
pub struct DissociationServer {
    config: ServerConfig,
    store: Arc<dyn StudyStore>,
    tracker: Arc<QueryTracker>,
    metrics: Option<MetricsHandle>,
}

impl DissociationServer {
    /// Create a new server over an already opened store.
    #[must_use]
    pub fn new(store: Arc<dyn StudyStore>, config: ServerConfig) -> Self {
        let tracked = TrackedStore::new(store);
        let tracker = Arc::clone(tracked.tracker());
        Self {
            config,
            store: Arc::new(tracked),
            tracker,
            metrics: None,
        }
    }

    /// Validate `config`, open its store and start metrics if configured.
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(config.store.as_ref())?;
        let metrics = config.metrics.as_ref().map(init_metrics).transpose()?;

        let mut server = Self::new(store, config);
        server.metrics = metrics;
        Ok(server)
    }

    /// Attach a metrics pipeline.
    #[must_use]
    pub fn with_metrics(mut self, handle: MetricsHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Per-operation counts of store queries issued so far.
    #[must_use]
    pub fn query_tracker(&self) -> &Arc<QueryTracker> {
        &self.tracker
    }

    /// Build the HTTP router for this server.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        let dissociator =
            Dissociator::new(Arc::clone(&self.store)).with_max_results(self.config.result_cap);
        let ctx = ApiContext::new(dissociator)
            .with_image_path(self.config.image_path.clone())
            .with_metrics(self.metrics.as_ref().map(|h| Arc::clone(h.metrics())));

        let mut rest_config = RestConfig::new().with_max_body_size(self.config.max_body_size);
        if let Some(timeout) = self.config.request_timeout {
            rest_config = rest_config.with_request_timeout(timeout);
        }

        rest::router_with_config(Arc::new(ctx), &rest_config)
    }

    /// Start the server, shutting down on SIGINT or SIGTERM.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(signals::wait_for_shutdown_signal())
            .await
    }

    /// Start the server with graceful shutdown support.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes.
    ///
    /// After the signal, in-flight requests get the configured grace period
    /// before open connections are dropped. The store is closed last.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            %addr,
            backend = %self.store.backend(),
            result_cap = self.config.result_cap,
            "Starting dissociation server"
        );

        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);
        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { stop_signal.notified().await })
            .into_future();
        tokio::pin!(server);
        tokio::pin!(shutdown);

        let outcome = tokio::select! {
            result = &mut server => result,
            () = &mut shutdown => {
                tracing::info!("Shutdown requested, draining in-flight requests");
                stop.notify_one();
                match tokio::time::timeout(self.config.shutdown_grace_period, &mut server).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(
                            grace_period_secs = self.config.shutdown_grace_period.as_secs(),
                            "Grace period elapsed, dropping open connections"
                        );
                        Ok(())
                    },
                }
            },
        };

        self.store.close().await;
        tracing::info!(
            queries_issued = self.tracker.total_issued(),
            "Store closed"
        );

        if let Some(handle) = self.metrics {
            if let Err(e) = handle.shutdown() {
                tracing::warn!(error = %e, "Metrics shutdown failed");
            }
        }

        outcome.map_err(ServerError::from)
    }
}
