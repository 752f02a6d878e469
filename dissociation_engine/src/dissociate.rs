// SPDX-License-Identifier: MIT OR Apache-2.0
//! Term and spatial dissociation resolvers.
//!
//! Each resolver issues capped set-difference queries against a
//! [`StudyStore`] and hands the raw sets to the result envelopes in
//! [`crate::result`]. Coordinate tokens are validated before any query runs.

use std::sync::Arc;

use crate::coords::Point3;
use crate::error::{DissociationError, Result};
use crate::result::{SpatialDissociation, TermDissociation};
use crate::store::StudyStore;
use crate::study::StudyId;

/// Hard cap on the size of every dissociation set.
pub const MAX_RESULTS: usize = 250;

/// Proximity radius used when a request does not give one.
pub const DEFAULT_RADIUS: f64 = 10.0;

/// Options for a spatial dissociation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialOptions {
    /// Proximity radius shared by both legs and both directions. Not validated.
    pub radius: f64,
    /// Also compute B minus A.
    pub bidirectional: bool,
}

impl Default for SpatialOptions {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            bidirectional: false,
        }
    }
}

impl SpatialOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the proximity radius.
    #[must_use]
    pub const fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Enable or disable the reverse direction.
    #[must_use]
    pub const fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }
}

/// Raw sets produced by the spatial resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialSets {
    /// Near A, not near B.
    pub a_minus_b: Vec<StudyId>,
    /// Near B, not near A, when requested.
    pub b_minus_a: Option<Vec<StudyId>>,
}

/// Parses a request token into a point, tagging failures with the token.
pub fn parse_location(token: &str) -> Result<Point3> {
    Point3::parse(token).map_err(|source| DissociationError::InvalidCoordinate {
        token: token.to_string(),
        source,
    })
}

/// Resolves dissociation queries against an injected store.
#[derive(Clone)]
pub struct Dissociator {
    store: Arc<dyn StudyStore>,
    max_results: usize,
}

impl Dissociator {
    /// Create a resolver over `store` with the default result cap.
    #[must_use]
    pub fn new(store: Arc<dyn StudyStore>) -> Self {
        Self {
            store,
            max_results: MAX_RESULTS,
        }
    }

    /// Lower the result cap. The value is clamped to `1..=MAX_RESULTS`.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, MAX_RESULTS);
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StudyStore> {
        &self.store
    }

    /// The result cap applied to every set.
    #[must_use]
    pub const fn max_results(&self) -> usize {
        self.max_results
    }

    fn cap(&self, mut ids: Vec<StudyId>) -> Vec<StudyId> {
        if ids.len() > self.max_results {
            tracing::debug!(
                returned = ids.len(),
                cap = self.max_results,
                "Store exceeded limit, truncating"
            );
            ids.truncate(self.max_results);
        }
        ids
    }

    /// Studies tagged with `term_a` but not `term_b`, exact match.
    pub async fn resolve_terms(&self, term_a: &str, term_b: &str) -> Result<Vec<StudyId>> {
        let ids = self
            .store
            .term_difference(term_a, term_b, self.max_results)
            .await?;
        Ok(self.cap(ids))
    }

    /// Studies near `point_a` but not near `point_b`, plus the reverse when
    /// `options.bidirectional` is set. Directions are resolved one after the
    /// other; either failing fails the whole request.
    pub async fn resolve_spatial(
        &self,
        point_a: Point3,
        point_b: Point3,
        options: SpatialOptions,
    ) -> Result<SpatialSets> {
        let a_minus_b = self
            .store
            .spatial_difference(point_a, point_b, options.radius, self.max_results)
            .await?;

        let b_minus_a = if options.bidirectional {
            let ids = self
                .store
                .spatial_difference(point_b, point_a, options.radius, self.max_results)
                .await?;
            Some(self.cap(ids))
        } else {
            None
        };

        Ok(SpatialSets {
            a_minus_b: self.cap(a_minus_b),
            b_minus_a,
        })
    }

    /// Term dissociation packaged for the response.
    pub async fn terms(&self, term_a: &str, term_b: &str) -> Result<TermDissociation> {
        let study_ids = self.resolve_terms(term_a, term_b).await?;
        tracing::debug!(term_a, term_b, count = study_ids.len(), "Resolved term dissociation");
        Ok(TermDissociation::new(term_a, term_b, study_ids))
    }

    /// Spatial dissociation from raw `x_y_z` tokens, packaged for the response.
    ///
    /// Both tokens are parsed before the store is touched.
    pub async fn locations(
        &self,
        coords_a: &str,
        coords_b: &str,
        options: SpatialOptions,
    ) -> Result<SpatialDissociation> {
        let point_a = parse_location(coords_a)?;
        let point_b = parse_location(coords_b)?;

        let sets = self.resolve_spatial(point_a, point_b, options).await?;
        tracing::debug!(
            coords_a,
            coords_b,
            radius = options.radius,
            a_minus_b = sets.a_minus_b.len(),
            b_minus_a = ?sets.b_minus_a.as_ref().map(Vec::len),
            "Resolved spatial dissociation"
        );

        Ok(SpatialDissociation::assemble(
            coords_a,
            coords_b,
            options.radius,
            sets.a_minus_b,
            sets.b_minus_a,
        ))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use proptest::prelude::*;

    use super::*;
    use crate::coords::CoordinateError;
    use crate::error::{StoreError, StoreResult};
    use crate::memory::MemoryStore;
    use crate::observability::TrackedStore;
    use crate::store::{CorpusDiagnostics, StoreBackend};

    /// Store that ignores the limit and returns every id it was built with.
    struct OverflowingStore(Vec<StudyId>);

    #[async_trait]
    impl StudyStore for OverflowingStore {
        fn backend(&self) -> StoreBackend {
            StoreBackend::Memory
        }

        async fn term_difference(&self, _: &str, _: &str, _: usize) -> StoreResult<Vec<StudyId>> {
            Ok(self.0.clone())
        }

        async fn spatial_difference(
            &self,
            _: Point3,
            _: Point3,
            _: f64,
            _: usize,
        ) -> StoreResult<Vec<StudyId>> {
            Ok(self.0.clone())
        }

        async fn diagnostics(&self, _: usize) -> StoreResult<CorpusDiagnostics> {
            Ok(CorpusDiagnostics::default())
        }
    }

    /// Store whose second spatial query fails.
    struct FlakyStore {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl StudyStore for FlakyStore {
        fn backend(&self) -> StoreBackend {
            StoreBackend::Postgres
        }

        async fn term_difference(&self, _: &str, _: &str, _: usize) -> StoreResult<Vec<StudyId>> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn spatial_difference(
            &self,
            _: Point3,
            _: Point3,
            _: f64,
            _: usize,
        ) -> StoreResult<Vec<StudyId>> {
            let n = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                Ok(vec![StudyId::Int(1)])
            } else {
                Err(StoreError::Query("canceling statement due to statement timeout".to_string()))
            }
        }

        async fn diagnostics(&self, _: usize) -> StoreResult<CorpusDiagnostics> {
            Err(StoreError::Query("unsupported".to_string()))
        }
    }

    fn ids(values: &[i64]) -> Vec<StudyId> {
        values.iter().copied().map(StudyId::Int).collect()
    }

    fn fear_reward() -> Dissociator {
        let store = MemoryStore::new();
        for id in [1_i64, 2, 3] {
            store.annotate(id, "fear");
        }
        for id in [2_i64, 3] {
            store.annotate(id, "reward");
        }
        Dissociator::new(Arc::new(store))
    }

    fn tracked_memory() -> (Dissociator, Arc<TrackedStore>) {
        let store = MemoryStore::new();
        store.add_coordinate(1_i64, Point3::new(0.0, -52.0, 26.0));
        store.add_coordinate(2_i64, Point3::new(40.0, 20.0, 0.0));
        let tracked = Arc::new(TrackedStore::new(Arc::new(store)));
        let dissociator = Dissociator::new(Arc::clone(&tracked) as Arc<dyn StudyStore>);
        (dissociator, tracked)
    }

    #[tokio::test]
    async fn test_fear_minus_reward() {
        let result = fear_reward().terms("fear", "reward").await.unwrap();
        assert_eq!(result.term_a, "fear");
        assert_eq!(result.term_b, "reward");
        assert_eq!(result.study_ids, ids(&[1]));
    }

    #[tokio::test]
    async fn test_term_minus_itself_is_empty() {
        let result = fear_reward().resolve_terms("fear", "fear").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_term_result_is_capped() {
        let store = MemoryStore::new();
        for id in 0..1000_i64 {
            store.annotate(id, "memory");
        }
        let dissociator = Dissociator::new(Arc::new(store));
        let result = dissociator.resolve_terms("memory", "attention").await.unwrap();
        assert_eq!(result.len(), MAX_RESULTS);
    }

    #[tokio::test]
    async fn test_cap_enforced_when_store_overflows() {
        let many: Vec<StudyId> = (0..600_i64).map(StudyId::Int).collect();
        let dissociator = Dissociator::new(Arc::new(OverflowingStore(many)));

        let terms = dissociator.resolve_terms("a", "b").await.unwrap();
        assert_eq!(terms.len(), MAX_RESULTS);
        assert_eq!(terms[0], StudyId::Int(0));

        let options = SpatialOptions::new().with_bidirectional(true);
        let origin = Point3::new(0.0, 0.0, 0.0);
        let sets = dissociator.resolve_spatial(origin, origin, options).await.unwrap();
        assert_eq!(sets.a_minus_b.len(), MAX_RESULTS);
        assert_eq!(sets.b_minus_a.map(|v| v.len()), Some(MAX_RESULTS));
    }

    #[tokio::test]
    async fn test_custom_cap() {
        let many: Vec<StudyId> = (0..10_i64).map(StudyId::Int).collect();
        let dissociator = Dissociator::new(Arc::new(OverflowingStore(many))).with_max_results(3);
        assert_eq!(dissociator.max_results(), 3);
        let terms = dissociator.resolve_terms("a", "b").await.unwrap();
        assert_eq!(terms, ids(&[0, 1, 2]));

        let zero = Dissociator::new(Arc::new(MemoryStore::new())).with_max_results(0);
        assert_eq!(zero.max_results(), 1);
    }

    #[tokio::test]
    async fn test_cap_cannot_be_raised_above_default() {
        let store = MemoryStore::new();
        for id in 0..1000_i64 {
            store.annotate(id, "memory");
        }
        let dissociator = Dissociator::new(Arc::new(store)).with_max_results(1000);
        assert_eq!(dissociator.max_results(), MAX_RESULTS);

        let result = dissociator.resolve_terms("memory", "attention").await.unwrap();
        assert!(result.len() <= MAX_RESULTS);
        assert_eq!(result.len(), MAX_RESULTS);
    }

    #[tokio::test]
    async fn test_same_point_is_empty() {
        let (dissociator, _) = tracked_memory();
        let result = dissociator
            .locations("0_-52_26", "0_-52_26", SpatialOptions::default())
            .await
            .unwrap();
        assert!(result.a_minus_b.study_ids.is_empty());
        assert_eq!(result.a_minus_b.count, 0);
    }

    #[tokio::test]
    async fn test_unidirectional_issues_one_query() {
        let (dissociator, tracked) = tracked_memory();
        let result = dissociator
            .locations("0_-52_26", "40_20_0", SpatialOptions::default())
            .await
            .unwrap();

        assert_eq!(result.a_minus_b.study_ids, ids(&[1]));
        assert!(result.b_minus_a.is_none());
        assert!((result.radius - DEFAULT_RADIUS).abs() < f64::EPSILON);
        assert_eq!(tracked.tracker().issued("spatial_difference"), 1);
    }

    #[tokio::test]
    async fn test_bidirectional_issues_two_queries() {
        let (dissociator, tracked) = tracked_memory();
        let options = SpatialOptions::new().with_bidirectional(true);
        let result = dissociator
            .locations("0_-52_26", "40_20_0", options)
            .await
            .unwrap();

        assert_eq!(result.a_minus_b.study_ids, ids(&[1]));
        let reverse = result.b_minus_a.unwrap();
        assert_eq!(reverse.study_ids, ids(&[2]));
        assert_eq!(reverse.from, "40_20_0");
        assert_eq!(reverse.not, "0_-52_26");
        assert_eq!(tracked.tracker().issued("spatial_difference"), 2);
    }

    #[tokio::test]
    async fn test_far_points_yield_empty_directions() {
        let dissociator = Dissociator::new(Arc::new(MemoryStore::new()));
        let options = SpatialOptions::new().with_radius(5.0).with_bidirectional(true);
        let result = dissociator
            .locations("0_0_0", "100_100_100", options)
            .await
            .unwrap();

        assert_eq!(result.a_minus_b.count, 0);
        assert!(result.a_minus_b.study_ids.is_empty());
        let reverse = result.b_minus_a.unwrap();
        assert_eq!(reverse.count, 0);
        assert!(reverse.study_ids.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_coordinates_issue_no_queries() {
        let (dissociator, tracked) = tracked_memory();

        let err = dissociator
            .locations("1_2_x", "0_0_0", SpatialOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DissociationError::InvalidCoordinate {
                source: CoordinateError::NotANumber { index: 2, .. },
                ..
            }
        ));

        let err = dissociator
            .locations("0_0_0", "1_2", SpatialOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DissociationError::InvalidCoordinate { ref token, .. } if token == "1_2"
        ));

        assert_eq!(tracked.tracker().total_issued(), 0);
    }

    #[tokio::test]
    async fn test_non_positive_radius_passed_through() {
        let (dissociator, _) = tracked_memory();
        let options = SpatialOptions::new().with_radius(-3.0);
        let result = dissociator
            .locations("0_-52_26", "40_20_0", options)
            .await
            .unwrap();
        assert!((result.radius + 3.0).abs() < f64::EPSILON);
        assert!(result.a_minus_b.study_ids.is_empty());
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let dissociator = Dissociator::new(Arc::new(FlakyStore {
            calls: std::sync::atomic::AtomicUsize::new(0),
        }));

        let err = dissociator.terms("fear", "reward").await.unwrap_err();
        assert!(matches!(err, DissociationError::Store(StoreError::Connection(_))));

        let options = SpatialOptions::new().with_bidirectional(true);
        let err = dissociator
            .locations("0_0_0", "1_1_1", options)
            .await
            .unwrap_err();
        assert!(matches!(err, DissociationError::Store(StoreError::Query(_))));
    }

    #[test]
    fn test_spatial_options_default() {
        let options = SpatialOptions::default();
        assert!((options.radius - 10.0).abs() < f64::EPSILON);
        assert!(!options.bidirectional);
    }

    proptest! {
        #[test]
        fn prop_difference_excludes_b(
            tagged_a in prop::collection::vec(0i64..40, 0..60),
            tagged_b in prop::collection::vec(0i64..40, 0..60),
        ) {
            let store = MemoryStore::new();
            for id in &tagged_a {
                store.annotate(*id, "a");
            }
            for id in &tagged_b {
                store.annotate(*id, "b");
            }
            let dissociator = Dissociator::new(Arc::new(store));

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let result = runtime.block_on(dissociator.resolve_terms("a", "b")).unwrap();

            let mut seen = std::collections::HashSet::new();
            for id in &result {
                let StudyId::Int(n) = id else { panic!("unexpected key {id}") };
                prop_assert!(tagged_a.contains(n));
                prop_assert!(!tagged_b.contains(n));
                prop_assert!(seen.insert(*n));
            }
            let expected = tagged_a
                .iter()
                .filter(|id| !tagged_b.contains(id))
                .collect::<std::collections::HashSet<_>>()
                .len();
            prop_assert_eq!(result.len(), expected);
        }

        #[test]
        fn prop_same_point_is_empty(
            x in -100.0f64..100.0,
            y in -100.0f64..100.0,
            z in -100.0f64..100.0,
            radius in 0.001f64..50.0,
        ) {
            let store = MemoryStore::new();
            store.add_coordinate(1_i64, Point3::new(x, y, z));
            store.add_coordinate(2_i64, Point3::new(x + 1.0, y, z));
            let dissociator = Dissociator::new(Arc::new(store));

            let point = Point3::new(x, y, z);
            let options = SpatialOptions::new().with_radius(radius).with_bidirectional(true);
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let sets = runtime
                .block_on(dissociator.resolve_spatial(point, point, options))
                .unwrap();
            prop_assert!(sets.a_minus_b.is_empty());
            prop_assert_eq!(sets.b_minus_a, Some(Vec::new()));
        }
    }
}
