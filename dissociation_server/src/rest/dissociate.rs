// SPDX-License-Identifier: MIT OR Apache-2.0
//! REST API handlers for dissociation queries.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use dissociation_engine::{SpatialDissociation, TermDissociation};

use crate::rest::error::{ApiError, ApiResult};
use crate::rest::params::LocationParams;
use crate::rest::ApiContext;

/// Studies tagged with `term_a` but not `term_b`.
pub async fn terms(
    State(ctx): State<Arc<ApiContext>>,
    Path((term_a, term_b)): Path<(String, String)>,
) -> ApiResult<TermDissociation> {
    let start = Instant::now();

    let result = ctx
        .dissociator
        .terms(&term_a, &term_b)
        .await
        .map_err(ApiError::from);

    ctx.observe("terms", start, &result);
    result.map(Json)
}

/// Studies near `coords_a` but not `coords_b`, optionally in both directions.
pub async fn locations(
    State(ctx): State<Arc<ApiContext>>,
    Path((coords_a, coords_b)): Path<(String, String)>,
    Query(params): Query<LocationParams>,
) -> ApiResult<SpatialDissociation> {
    let start = Instant::now();

    let result = resolve_locations(&ctx, &coords_a, &coords_b, params).await;

    ctx.observe("locations", start, &result);
    result.map(Json)
}

async fn resolve_locations(
    ctx: &ApiContext,
    coords_a: &str,
    coords_b: &str,
    params: LocationParams,
) -> Result<SpatialDissociation, ApiError> {
    let options = params.into_options()?;
    Ok(ctx.dissociator.locations(coords_a, coords_b, options).await?)
}
