// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dissociation queries over a neuroimaging study corpus.
//!
//! A dissociation is a set difference between two groups of studies:
//!
//! - Term dissociation: studies tagged with one term but not another
//! - Spatial dissociation: studies reporting activation near one location but
//!   not near another, optionally in both directions
//!
//! Results are capped at [`MAX_RESULTS`] study ids per direction. Storage is
//! abstracted behind [`StudyStore`], with an in-process [`MemoryStore`] and a
//! PostGIS-backed [`PgStore`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dissociation_engine::{Dissociator, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.annotate(1_i64, "fear");
//! let dissociator = Dissociator::new(Arc::new(store));
//! let result = dissociator.terms("fear", "reward").await?;
//! assert_eq!(result.study_ids.len(), 1);
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
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]

pub mod coords;
pub mod dissociate;
pub mod error;
pub mod memory;
pub mod observability;
pub mod postgres;
pub mod result;
pub mod store;
pub mod study;

pub use coords::{CoordinateError, Point3, COORDINATE_SEPARATOR};
pub use dissociate::{
    parse_location, Dissociator, SpatialOptions, SpatialSets, DEFAULT_RADIUS, MAX_RESULTS,
};
pub use error::{DissociationError, Result, StoreError, StoreResult};
pub use memory::{Corpus, MemoryStore};
pub use observability::{QueryTracker, TrackedStore, DEFAULT_SLOW_QUERY_THRESHOLD};
pub use postgres::{PgStore, PgStoreConfig};
pub use result::{DirectionResult, SpatialDissociation, TermDissociation};
pub use store::{CorpusDiagnostics, StoreBackend, StudyStore};
pub use study::{CoordinateRow, StudyId, StudyMetadata, TermAnnotation};
