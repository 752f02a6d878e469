// SPDX-License-Identifier: MIT OR Apache-2.0
//! Response envelopes for dissociation results.

use serde::{Deserialize, Serialize};

use crate::study::StudyId;

/// Studies tagged with `term_a` but not `term_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermDissociation {
    /// Included term, as requested.
    pub term_a: String,
    /// Excluded term, as requested.
    pub term_b: String,
    /// Matching studies in store order.
    pub study_ids: Vec<StudyId>,
}

impl TermDissociation {
    /// Packages a term resolver result.
    #[must_use]
    pub fn new(term_a: impl Into<String>, term_b: impl Into<String>, study_ids: Vec<StudyId>) -> Self {
        Self {
            term_a: term_a.into(),
            term_b: term_b.into(),
            study_ids,
        }
    }
}

/// One direction of a spatial dissociation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionResult {
    /// Coordinate token the studies are near.
    pub from: String,
    /// Coordinate token the studies are not near.
    pub not: String,
    /// Number of studies in `study_ids`.
    pub count: usize,
    /// Matching studies in store order.
    pub study_ids: Vec<StudyId>,
}

impl DirectionResult {
    /// Packages one direction, counting its members.
    #[must_use]
    pub fn new(from: impl Into<String>, not: impl Into<String>, study_ids: Vec<StudyId>) -> Self {
        Self {
            from: from.into(),
            not: not.into(),
            count: study_ids.len(),
            study_ids,
        }
    }
}

/// Studies near one location but not another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialDissociation {
    /// First coordinate token, as requested.
    pub coords_a: String,
    /// Second coordinate token, as requested.
    pub coords_b: String,
    /// Proximity radius used for every leg.
    pub radius: f64,
    /// Near A, not near B.
    #[serde(rename = "direction_A_minus_B")]
    pub a_minus_b: DirectionResult,
    /// Near B, not near A. Present only for bidirectional requests.
    #[serde(
        rename = "direction_B_minus_A",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub b_minus_a: Option<DirectionResult>,
}

impl SpatialDissociation {
    /// Packages the resolved directions under their request tokens.
    #[must_use]
    pub fn assemble(
        coords_a: &str,
        coords_b: &str,
        radius: f64,
        a_minus_b: Vec<StudyId>,
        b_minus_a: Option<Vec<StudyId>>,
    ) -> Self {
        Self {
            coords_a: coords_a.to_string(),
            coords_b: coords_b.to_string(),
            radius,
            a_minus_b: DirectionResult::new(coords_a, coords_b, a_minus_b),
            b_minus_a: b_minus_a.map(|ids| DirectionResult::new(coords_b, coords_a, ids)),
        }
    }

    /// Whether the reverse direction was computed.
    #[must_use]
    pub const fn is_bidirectional(&self) -> bool {
        self.b_minus_a.is_some()
    }
}
