// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process corpus store.
//!
//! Tables are kept in insertion order behind a single `RwLock`. Set
//! differences preserve the order in which qualifying studies were first
//! inserted, which keeps results deterministic for a fixed corpus.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::coords::Point3;
use crate::error::StoreResult;
use crate::store::{CorpusDiagnostics, StoreBackend, StudyStore};
use crate::study::{CoordinateRow, StudyId, StudyMetadata, TermAnnotation};

/// Serializable corpus tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    /// Term annotations.
    #[serde(default)]
    pub annotations: Vec<TermAnnotation>,
    /// Activation coordinates.
    #[serde(default)]
    pub coordinates: Vec<CoordinateRow>,
    /// Study metadata.
    #[serde(default)]
    pub metadata: Vec<StudyMetadata>,
}

/// A [`StudyStore`] over in-memory tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    corpus: RwLock<Corpus>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store over existing tables.
    #[must_use]
    pub fn from_corpus(corpus: Corpus) -> Self {
        Self {
            corpus: RwLock::new(corpus),
        }
    }

    /// Decodes a JSON corpus document.
    pub fn from_json_str(json: &str) -> StoreResult<Self> {
        let corpus: Corpus = serde_json::from_str(json)?;
        Ok(Self::from_corpus(corpus))
    }

    /// Loads a JSON corpus file.
    pub fn from_json_path(path: &Path) -> StoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let corpus: Corpus = serde_json::from_str(&json)?;
        tracing::info!(
            path = %path.display(),
            annotations = corpus.annotations.len(),
            coordinates = corpus.coordinates.len(),
            metadata = corpus.metadata.len(),
            "Loaded corpus"
        );
        Ok(Self::from_corpus(corpus))
    }

    /// Tags a study with a term.
    pub fn annotate(&self, study_id: impl Into<StudyId>, term: impl Into<String>) {
        self.insert_annotation(TermAnnotation::new(study_id, term));
    }

    /// Adds an annotation row.
    pub fn insert_annotation(&self, annotation: TermAnnotation) {
        self.corpus.write().annotations.push(annotation);
    }

    /// Records an activation location for a study.
    pub fn add_coordinate(&self, study_id: impl Into<StudyId>, point: Point3) {
        self.corpus
            .write()
            .coordinates
            .push(CoordinateRow::new(study_id, point));
    }

    /// Adds a metadata row.
    pub fn insert_metadata(&self, metadata: StudyMetadata) {
        self.corpus.write().metadata.push(metadata);
    }

    /// Copy of the current tables.
    #[must_use]
    pub fn snapshot(&self) -> Corpus {
        self.corpus.read().clone()
    }
}

/// Ordered `include \ exclude` over distinct ids, truncated to `limit`.
fn ordered_difference<'a>(
    include: impl Iterator<Item = &'a StudyId>,
    exclude: impl Iterator<Item = &'a StudyId>,
    limit: usize,
) -> Vec<StudyId> {
    let excluded: HashSet<&StudyId> = exclude.collect();
    let mut seen: HashSet<&StudyId> = HashSet::new();
    let mut result = Vec::new();

    for id in include {
        if result.len() >= limit {
            break;
        }
        if excluded.contains(id) || !seen.insert(id) {
            continue;
        }
        result.push(id.clone());
    }

    result
}

#[async_trait]
impl StudyStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    async fn term_difference(
        &self,
        include: &str,
        exclude: &str,
        limit: usize,
    ) -> StoreResult<Vec<StudyId>> {
        let corpus = self.corpus.read();

        Ok(ordered_difference(
            corpus
                .annotations
                .iter()
                .filter(|a| a.term == include)
                .map(|a| &a.study_id),
            corpus
                .annotations
                .iter()
                .filter(|a| a.term == exclude)
                .map(|a| &a.study_id),
            limit,
        ))
    }

    async fn spatial_difference(
        &self,
        near: Point3,
        not_near: Point3,
        radius: f64,
        limit: usize,
    ) -> StoreResult<Vec<StudyId>> {
        let corpus = self.corpus.read();

        Ok(ordered_difference(
            corpus
                .coordinates
                .iter()
                .filter(|c| c.point().is_within(&near, radius))
                .map(|c| &c.study_id),
            corpus
                .coordinates
                .iter()
                .filter(|c| c.point().is_within(&not_near, radius))
                .map(|c| &c.study_id),
            limit,
        ))
    }

    async fn diagnostics(&self, sample_size: usize) -> StoreResult<CorpusDiagnostics> {
        let corpus = self.corpus.read();

        Ok(CorpusDiagnostics {
            coordinates_count: corpus.coordinates.len() as u64,
            metadata_count: corpus.metadata.len() as u64,
            annotations_terms_count: corpus.annotations.len() as u64,
            coordinates_sample: corpus.coordinates.iter().take(sample_size).cloned().collect(),
            metadata_sample: corpus.metadata.iter().take(sample_size).cloned().collect(),
            annotations_terms_sample: corpus.annotations.iter().take(sample_size).cloned().collect(),
        })
    }
}
