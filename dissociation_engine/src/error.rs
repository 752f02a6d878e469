// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for dissociation queries.

use thiserror::Error;

use crate::coords::CoordinateError;

/// Failure reported by a [`StudyStore`](crate::store::StudyStore).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not be reached or refused the connection.
    #[error("{0}")]
    Connection(String),

    /// Any other failure while executing a query.
    #[error("{0}")]
    Query(String),

    /// The store was configured with invalid settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// A corpus file could not be decoded.
    #[error("corpus error: {0}")]
    Corpus(String),

    /// I/O error while loading a corpus.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this failure means the store was unreachable.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corpus(err.to_string())
    }
}

/// Failure of a dissociation request.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DissociationError {
    /// A coordinate token was malformed. No query was issued.
    #[error("invalid coordinate {token:?}: {source}")]
    InvalidCoordinate {
        /// The rejected token.
        token: String,
        /// Why it was rejected.
        #[source]
        source: CoordinateError,
    },

    /// The store failed while answering.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for dissociation requests.
pub type Result<T> = std::result::Result<T, DissociationError>;
