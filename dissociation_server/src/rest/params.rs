// SPDX-License-Identifier: MIT OR Apache-2.0
//! Query-string parameters for the location endpoint.

use dissociation_engine::SpatialOptions;
use serde::{Deserialize, Serialize};

use crate::rest::error::ApiError;

/// Raw `?radius=&bidirectional=` values, kept as text until validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationParams {
    /// Proximity radius. Defaults to 10 when absent.
    pub radius: Option<String>,
    /// `"true"` in any letter case enables the reverse direction.
    pub bidirectional: Option<String>,
}

impl LocationParams {
    /// Parses the raw values into resolver options.
    pub fn into_options(self) -> Result<SpatialOptions, ApiError> {
        let mut options = SpatialOptions::default();

        if let Some(raw) = self.radius {
            let radius = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|r| r.is_finite())
                .ok_or_else(|| {
                    ApiError::bad_request(format!("Invalid radius {raw:?}. Use a number."))
                })?;
            options = options.with_radius(radius);
        }

        let bidirectional = self
            .bidirectional
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true"));

        Ok(options.with_bidirectional(bidirectional))
    }
}
