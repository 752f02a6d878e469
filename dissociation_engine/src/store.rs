// SPDX-License-Identifier: MIT OR Apache-2.0
//! Storage collaborator interface.
//!
//! A store answers capped set-difference queries over the corpus. The
//! resolvers never see rows, only the study identifiers a store returns.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::coords::Point3;
use crate::error::StoreResult;
use crate::study::{CoordinateRow, StudyId, StudyMetadata, TermAnnotation};

/// Storage backend behind a [`StudyStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process tables.
    Memory,
    /// PostgreSQL with PostGIS.
    Postgres,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

/// Row counts and small samples of each corpus table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusDiagnostics {
    /// Rows in the coordinate table.
    pub coordinates_count: u64,
    /// Rows in the metadata table.
    pub metadata_count: u64,
    /// Rows in the term annotation table.
    pub annotations_terms_count: u64,
    /// First coordinate rows.
    pub coordinates_sample: Vec<CoordinateRow>,
    /// First metadata rows.
    pub metadata_sample: Vec<StudyMetadata>,
    /// First annotation rows.
    pub annotations_terms_sample: Vec<TermAnnotation>,
}

/// Read-only access to the study corpus.
///
/// Implementations return distinct study ids in their own deterministic order
/// and never more than `limit` of them.
#[async_trait]
pub trait StudyStore: Send + Sync {
    /// Which backend this store uses.
    fn backend(&self) -> StoreBackend;

    /// Studies annotated with `include` but not with `exclude`.
    async fn term_difference(
        &self,
        include: &str,
        exclude: &str,
        limit: usize,
    ) -> StoreResult<Vec<StudyId>>;

    /// Studies with a coordinate within `radius` of `near` but none within
    /// `radius` of `not_near`.
    async fn spatial_difference(
        &self,
        near: Point3,
        not_near: Point3,
        radius: f64,
        limit: usize,
    ) -> StoreResult<Vec<StudyId>>;

    /// Table counts plus up to `sample_size` rows of each table.
    async fn diagnostics(&self, sample_size: usize) -> StoreResult<CorpusDiagnostics>;

    /// Release pooled connections. Called once on shutdown.
    async fn close(&self) {}
}
