// SPDX-License-Identifier: MIT OR Apache-2.0
//! Corpus record types.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::coords::Point3;

/// Opaque study identifier.
///
/// Numeric keys serialize as JSON integers, anything else as a JSON string.
/// String keys are decoded through [`StudyId::from_key`], so `7` and `"7"`
/// name the same study.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum StudyId {
    /// Integer key.
    Int(i64),
    /// Non-numeric key.
    Text(String),
}

impl StudyId {
    /// Builds an identifier from a textual key, keeping canonical integers numeric.
    ///
    /// `"123"` becomes `Int(123)`; `"0123"` and `"abc"` stay text so the key is
    /// never rewritten.
    #[must_use]
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        match key.parse::<i64>() {
            Ok(n) if n.to_string() == key => Self::Int(n),
            _ => Self::Text(key),
        }
    }
}

impl From<i64> for StudyId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for StudyId {
    fn from(key: &str) -> Self {
        Self::from_key(key)
    }
}

impl From<String> for StudyId {
    fn from(key: String) -> Self {
        Self::from_key(key)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStudyId {
    Int(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for StudyId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawStudyId::deserialize(deserializer)? {
            RawStudyId::Int(id) => Self::Int(id),
            RawStudyId::Text(key) => Self::from_key(key),
        })
    }
}

impl fmt::Display for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(key) => f.write_str(key),
        }
    }
}

/// A term attached to a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermAnnotation {
    /// Annotated study.
    pub study_id: StudyId,
    /// Contrast the annotation was derived from.
    #[serde(default)]
    pub contrast_id: Option<String>,
    /// Term label, matched exactly.
    pub term: String,
    /// Annotation weight.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl TermAnnotation {
    /// Creates an annotation without contrast or weight.
    #[must_use]
    pub fn new(study_id: impl Into<StudyId>, term: impl Into<String>) -> Self {
        Self {
            study_id: study_id.into(),
            contrast_id: None,
            term: term.into(),
            weight: None,
        }
    }

    /// Sets the annotation weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Sets the contrast identifier.
    #[must_use]
    pub fn with_contrast(mut self, contrast_id: impl Into<String>) -> Self {
        self.contrast_id = Some(contrast_id.into());
        self
    }
}

/// An activation location reported by a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRow {
    /// Reporting study.
    pub study_id: StudyId,
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component, absent for planar geometries.
    #[serde(default)]
    pub z: Option<f64>,
}

impl CoordinateRow {
    /// Creates a coordinate row.
    #[must_use]
    pub fn new(study_id: impl Into<StudyId>, point: Point3) -> Self {
        Self {
            study_id: study_id.into(),
            x: point.x,
            y: point.y,
            z: Some(point.z),
        }
    }

    /// The location as a point. Planar rows lie on `z = 0`.
    #[must_use]
    pub fn point(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z.unwrap_or_default())
    }
}

/// Bibliographic metadata for a study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyMetadata {
    /// Described study.
    pub study_id: StudyId,
    /// Publication title.
    #[serde(default)]
    pub title: Option<String>,
    /// Publication year.
    #[serde(default)]
    pub year: Option<i64>,
}

impl StudyMetadata {
    /// Creates a metadata row.
    #[must_use]
    pub fn new(study_id: impl Into<StudyId>, title: impl Into<String>, year: i64) -> Self {
        Self {
            study_id: study_id.into(),
            title: Some(title.into()),
            year: Some(year),
        }
    }
}
