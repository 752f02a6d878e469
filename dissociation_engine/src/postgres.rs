// SPDX-License-Identifier: MIT OR Apache-2.0
//! PostgreSQL/PostGIS corpus store.
//!
//! Expects three tables under one schema (default `ns`):
//! `annotations_terms(study_id, contrast_id, term, weight)`,
//! `coordinates(study_id, geom)` with `geom` a PostGIS point in SRID 4326, and
//! `metadata(study_id, title, year)`.
//!
//! Each query checks a connection out of the pool for its own duration; the
//! pool returns it on every exit path.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::coords::Point3;
use crate::error::{StoreError, StoreResult};
use crate::store::{CorpusDiagnostics, StoreBackend, StudyStore};
use crate::study::{CoordinateRow, StudyId, StudyMetadata, TermAnnotation};

/// Schema holding the corpus tables when none is configured.
pub const DEFAULT_SCHEMA: &str = "ns";

/// Connection settings for [`PgStore`].
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    /// Connection URL (`postgres://` or `postgresql://`).
    pub url: String,
    /// Schema containing the corpus tables.
    pub schema: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    pub acquire_timeout: Duration,
}

impl PgStoreConfig {
    /// Create a configuration for `url` with default pool settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            schema: DEFAULT_SCHEMA.to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Set the schema name.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Set the maximum pool size.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> StoreResult<()> {
        if self.url.is_empty() {
            return Err(StoreError::Config("database url is empty".to_string()));
        }
        if !is_identifier(&self.schema) {
            return Err(StoreError::Config(format!(
                "invalid schema name {:?}",
                self.schema
            )));
        }
        if self.max_connections == 0 {
            return Err(StoreError::Config(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whether `name` is safe to splice into SQL as an unquoted identifier.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SQL text prepared for one schema.
#[derive(Debug, Clone)]
struct Statements {
    term_difference: String,
    spatial_difference: String,
    count_coordinates: String,
    count_metadata: String,
    count_annotations: String,
    sample_coordinates: String,
    sample_metadata: String,
    sample_annotations: String,
}

impl Statements {
    fn for_schema(schema: &str) -> Self {
        Self {
            term_difference: format!(
                "SELECT study_id::text FROM {schema}.annotations_terms WHERE term = $1 \
                 EXCEPT \
                 SELECT study_id::text FROM {schema}.annotations_terms WHERE term = $2 \
                 LIMIT $3"
            ),
            spatial_difference: format!(
                "SELECT study_id::text FROM {schema}.coordinates \
                 WHERE ST_DWithin(geom, ST_SetSRID(ST_MakePoint($1, $2, $3), 4326), $7) \
                 EXCEPT \
                 SELECT study_id::text FROM {schema}.coordinates \
                 WHERE ST_DWithin(geom, ST_SetSRID(ST_MakePoint($4, $5, $6), 4326), $7) \
                 LIMIT $8"
            ),
            count_coordinates: format!("SELECT COUNT(*) FROM {schema}.coordinates"),
            count_metadata: format!("SELECT COUNT(*) FROM {schema}.metadata"),
            count_annotations: format!("SELECT COUNT(*) FROM {schema}.annotations_terms"),
            sample_coordinates: format!(
                "SELECT study_id::text, ST_X(geom), ST_Y(geom), ST_Z(geom) \
                 FROM {schema}.coordinates LIMIT $1"
            ),
            sample_metadata: format!(
                "SELECT study_id::text, title::text, year::bigint FROM {schema}.metadata LIMIT $1"
            ),
            sample_annotations: format!(
                "SELECT study_id::text, contrast_id::text, term::text, weight::double precision \
                 FROM {schema}.annotations_terms LIMIT $1"
            ),
        }
    }
}

/// SQLSTATE classes that mean the server was unreachable or refused us.
fn is_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08") || code.starts_with("28") || matches!(code, "57P01" | "57P02" | "57P03")
}

/// Maps a driver error onto the store taxonomy.
fn classify(err: sqlx::Error) -> StoreError {
    let connection = match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db.code().is_some_and(|code| is_connection_sqlstate(&code)),
        _ => false,
    };

    if connection {
        StoreError::Connection(err.to_string())
    } else {
        StoreError::Query(err.to_string())
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// A [`StudyStore`] backed by a PostgreSQL connection pool.
pub struct PgStore {
    pool: PgPool,
    statements: Statements,
}

impl PgStore {
    /// Build the pool without connecting. Connections open on first use, so
    /// an unreachable database surfaces as a connection error per request.
    pub fn connect_lazy(config: &PgStoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .test_before_acquire(true)
            .connect_lazy(&config.url)
            .map_err(classify)?;

        tracing::info!(
            schema = %config.schema,
            max_connections = config.max_connections,
            "PostgreSQL pool configured"
        );

        Ok(Self {
            pool,
            statements: Statements::for_schema(&config.schema),
        })
    }

    async fn count(&self, sql: &str) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl StudyStore for PgStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Postgres
    }

    async fn term_difference(
        &self,
        include: &str,
        exclude: &str,
        limit: usize,
    ) -> StoreResult<Vec<StudyId>> {
        let keys: Vec<String> = sqlx::query_scalar(&self.statements.term_difference)
            .bind(include)
            .bind(exclude)
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        Ok(keys.into_iter().map(StudyId::from_key).collect())
    }

    async fn spatial_difference(
        &self,
        near: Point3,
        not_near: Point3,
        radius: f64,
        limit: usize,
    ) -> StoreResult<Vec<StudyId>> {
        let keys: Vec<String> = sqlx::query_scalar(&self.statements.spatial_difference)
            .bind(near.x)
            .bind(near.y)
            .bind(near.z)
            .bind(not_near.x)
            .bind(not_near.y)
            .bind(not_near.z)
            .bind(radius)
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        Ok(keys.into_iter().map(StudyId::from_key).collect())
    }

    async fn diagnostics(&self, sample_size: usize) -> StoreResult<CorpusDiagnostics> {
        let limit = sql_limit(sample_size);

        let coordinates_count = self.count(&self.statements.count_coordinates).await?;
        let metadata_count = self.count(&self.statements.count_metadata).await?;
        let annotations_terms_count = self.count(&self.statements.count_annotations).await?;

        let coordinates: Vec<(String, f64, f64, Option<f64>)> =
            sqlx::query_as(&self.statements.sample_coordinates)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;

        let metadata: Vec<(String, Option<String>, Option<i64>)> =
            sqlx::query_as(&self.statements.sample_metadata)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;

        let annotations: Vec<(String, Option<String>, String, Option<f64>)> =
            sqlx::query_as(&self.statements.sample_annotations)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;

        Ok(CorpusDiagnostics {
            coordinates_count,
            metadata_count,
            annotations_terms_count,
            coordinates_sample: coordinates
                .into_iter()
                .map(|(id, x, y, z)| CoordinateRow {
                    study_id: StudyId::from_key(id),
                    x,
                    y,
                    z,
                })
                .collect(),
            metadata_sample: metadata
                .into_iter()
                .map(|(id, title, year)| StudyMetadata {
                    study_id: StudyId::from_key(id),
                    title,
                    year,
                })
                .collect(),
            annotations_terms_sample: annotations
                .into_iter()
                .map(|(id, contrast_id, term, weight)| TermAnnotation {
                    study_id: StudyId::from_key(id),
                    contrast_id,
                    term,
                    weight,
                })
                .collect(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}
