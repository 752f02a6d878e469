// SPDX-License-Identifier: MIT OR Apache-2.0
//! Query observability for study stores.
//!
//! [`TrackedStore`] wraps any [`StudyStore`], counts issued queries per
//! operation and logs slow ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;

use crate::coords::Point3;
use crate::error::StoreResult;
use crate::store::{CorpusDiagnostics, StoreBackend, StudyStore};
use crate::study::StudyId;

/// Default threshold above which a store query is logged as slow.
pub const DEFAULT_SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(100);

/// Execution record of a single store query.
#[derive(Debug, Clone)]
pub struct QueryMetrics {
    /// Operation name (`term_difference`, `spatial_difference`, `diagnostics`).
    pub operation: &'static str,
    /// Number of study ids returned.
    pub rows_returned: usize,
    /// Whether the result reached the requested limit.
    pub hit_limit: bool,
    /// Query execution duration.
    pub duration: Duration,
}

impl QueryMetrics {
    /// Creates new query metrics.
    #[must_use]
    pub const fn new(operation: &'static str) -> Self {
        Self {
            operation,
            rows_returned: 0,
            hit_limit: false,
            duration: Duration::ZERO,
        }
    }

    /// Sets the number of rows returned and whether they filled `limit`.
    #[must_use]
    pub const fn with_rows_returned(mut self, count: usize, limit: usize) -> Self {
        self.rows_returned = count;
        self.hit_limit = count >= limit;
        self
    }

    /// Sets the query duration.
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Logs a warning when a query exceeded `threshold`. Returns whether it did.
pub fn check_slow_query(metrics: &QueryMetrics, threshold: Duration) -> bool {
    let slow = metrics.duration > threshold;
    if slow {
        warn!(
            operation = %metrics.operation,
            duration_ms = %metrics.duration.as_millis(),
            rows_returned = %metrics.rows_returned,
            hit_limit = metrics.hit_limit,
            "slow query detected"
        );
    }
    slow
}

/// Per-operation query and failure counters.
#[derive(Debug, Default)]
pub struct QueryTracker {
    issued: DashMap<&'static str, AtomicU64>,
    failed: DashMap<&'static str, AtomicU64>,
}

impl QueryTracker {
    /// Creates a new tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an issued query.
    pub fn record_issued(&self, operation: &'static str) {
        self.issued
            .entry(operation)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed query.
    pub fn record_failure(&self, operation: &'static str) {
        self.failed
            .entry(operation)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Queries issued for one operation.
    #[must_use]
    pub fn issued(&self, operation: &str) -> u64 {
        self.issued
            .get(operation)
            .map_or(0, |v| v.load(Ordering::Relaxed))
    }

    /// Failures recorded for one operation.
    #[must_use]
    pub fn failures(&self, operation: &str) -> u64 {
        self.failed
            .get(operation)
            .map_or(0, |v| v.load(Ordering::Relaxed))
    }

    /// Queries issued across all operations.
    #[must_use]
    pub fn total_issued(&self) -> u64 {
        self.issued
            .iter()
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    /// Resets all counters.
    pub fn reset(&self) {
        self.issued.clear();
        self.failed.clear();
    }
}

/// A store wrapper that records every query it forwards.
pub struct TrackedStore {
    inner: Arc<dyn StudyStore>,
    tracker: Arc<QueryTracker>,
}

impl TrackedStore {
    /// Wraps a store with a fresh tracker.
    #[must_use]
    pub fn new(inner: Arc<dyn StudyStore>) -> Self {
        Self {
            inner,
            tracker: Arc::new(QueryTracker::new()),
        }
    }

    /// The tracker counting forwarded queries.
    #[must_use]
    pub fn tracker(&self) -> &Arc<QueryTracker> {
        &self.tracker
    }

    fn observe<T>(
        &self,
        operation: &'static str,
        start: Instant,
        result: &StoreResult<T>,
        rows: impl FnOnce(&T) -> (usize, usize),
    ) {
        match result {
            Ok(value) => {
                let (count, limit) = rows(value);
                let metrics = QueryMetrics::new(operation)
                    .with_rows_returned(count, limit)
                    .with_duration(start.elapsed());
                let _ = check_slow_query(&metrics, DEFAULT_SLOW_QUERY_THRESHOLD);
            },
            Err(e) => {
                self.tracker.record_failure(operation);
                warn!(operation, error = %e, "store query failed");
            },
        }
    }
}

#[async_trait]
impl StudyStore for TrackedStore {
    fn backend(&self) -> StoreBackend {
        self.inner.backend()
    }

    async fn term_difference(
        &self,
        include: &str,
        exclude: &str,
        limit: usize,
    ) -> StoreResult<Vec<StudyId>> {
        const OP: &str = "term_difference";
        self.tracker.record_issued(OP);
        let start = Instant::now();
        let result = self.inner.term_difference(include, exclude, limit).await;
        self.observe(OP, start, &result, |ids| (ids.len(), limit));
        result
    }

    async fn spatial_difference(
        &self,
        near: Point3,
        not_near: Point3,
        radius: f64,
        limit: usize,
    ) -> StoreResult<Vec<StudyId>> {
        const OP: &str = "spatial_difference";
        self.tracker.record_issued(OP);
        let start = Instant::now();
        let result = self
            .inner
            .spatial_difference(near, not_near, radius, limit)
            .await;
        self.observe(OP, start, &result, |ids| (ids.len(), limit));
        result
    }

    async fn diagnostics(&self, sample_size: usize) -> StoreResult<CorpusDiagnostics> {
        const OP: &str = "diagnostics";
        self.tracker.record_issued(OP);
        let start = Instant::now();
        let result = self.inner.diagnostics(sample_size).await;
        self.observe(OP, start, &result, |d| {
            (d.coordinates_sample.len(), sample_size.max(1))
        });
        result
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}
