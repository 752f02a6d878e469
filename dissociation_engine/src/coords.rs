// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parsing of compound `x_y_z` coordinate tokens.
//!
//! Tokens arrive as path segments such as `0_-52_26`. A token is accepted only
//! when it splits into exactly three finite decimal components; no anatomical
//! range is enforced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the components of a coordinate token.
pub const COORDINATE_SEPARATOR: char = '_';

/// Number of components in a coordinate token.
const COMPONENTS: usize = 3;

/// Reason a coordinate token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    /// The token did not split into exactly three components.
    #[error("expected 3 components separated by '_', found {0}")]
    PartCount(usize),

    /// A component is not a decimal number.
    #[error("component {index} ({value:?}) is not a number")]
    NotANumber {
        /// Zero-based component position.
        index: usize,
        /// The offending text.
        value: String,
    },

    /// A component parsed to infinity or NaN.
    #[error("component {index} ({value:?}) is not finite")]
    NotFinite {
        /// Zero-based component position.
        index: usize,
        /// The offending text.
        value: String,
    },
}

/// A point in the corpus coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Point3 {
    /// Creates a point from its components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Parses an `x_y_z` token.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] when the token does not have exactly three
    /// components or any component is not a finite number.
    pub fn parse(token: &str) -> Result<Self, CoordinateError> {
        let parts: Vec<&str> = token.split(COORDINATE_SEPARATOR).collect();
        if parts.len() != COMPONENTS {
            return Err(CoordinateError::PartCount(parts.len()));
        }

        let mut values = [0.0_f64; COMPONENTS];
        for (index, (slot, part)) in values.iter_mut().zip(&parts).enumerate() {
            let value: f64 = part.parse().map_err(|_| CoordinateError::NotANumber {
                index,
                value: (*part).to_string(),
            })?;
            if !value.is_finite() {
                return Err(CoordinateError::NotFinite {
                    index,
                    value: (*part).to_string(),
                });
            }
            *slot = value;
        }

        Ok(Self::new(values[0], values[1], values[2]))
    }

    /// Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Whether `other` lies within `radius` of this point (inclusive).
    ///
    /// A negative radius matches nothing.
    #[inline]
    #[must_use]
    pub fn is_within(&self, other: &Self, radius: f64) -> bool {
        self.distance_to(other) <= radius
    }
}

impl FromStr for Point3 {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_signed_components() {
        let point = Point3::parse("0_-52_26").unwrap();
        assert_eq!(point, Point3::new(0.0, -52.0, 26.0));
    }

    #[test]
    fn test_parse_fractional_components() {
        let point = Point3::parse("1.5_-2.25_26.0").unwrap();
        assert_eq!(point, Point3::new(1.5, -2.25, 26.0));
    }

    #[test]
    fn test_parse_too_few_parts() {
        assert_eq!(Point3::parse("1_2"), Err(CoordinateError::PartCount(2)));
    }

    #[test]
    fn test_parse_too_many_parts() {
        assert_eq!(Point3::parse("1_2_3_4"), Err(CoordinateError::PartCount(4)));
    }

    #[test]
    fn test_parse_non_numeric() {
        let err = Point3::parse("a_b_c").unwrap_err();
        assert_eq!(
            err,
            CoordinateError::NotANumber {
                index: 0,
                value: "a".to_string()
            }
        );
    }

    #[test]
    fn test_parse_reports_offending_component() {
        let err = Point3::parse("1_2_x").unwrap_err();
        assert!(matches!(err, CoordinateError::NotANumber { index: 2, .. }));
        assert!(err.to_string().contains("\"x\""));
    }

    #[test]
    fn test_parse_empty_component() {
        assert!(matches!(
            Point3::parse("1__3"),
            Err(CoordinateError::NotANumber { index: 1, .. })
        ));
        assert_eq!(Point3::parse(""), Err(CoordinateError::PartCount(1)));
    }

    #[test]
    fn test_parse_rejects_non_finite() {
        assert!(matches!(
            Point3::parse("inf_0_0"),
            Err(CoordinateError::NotFinite { index: 0, .. })
        ));
        assert!(matches!(
            Point3::parse("0_NaN_0"),
            Err(CoordinateError::NotFinite { index: 1, .. })
        ));
    }

    #[test]
    fn test_parse_accepts_out_of_brain_values() {
        let point = Point3::parse("1000_-1000_0.001").unwrap();
        assert_eq!(point.x, 1000.0);
    }

    #[test]
    fn test_from_str() {
        let point: Point3 = "4_5_6".parse().unwrap();
        assert_eq!(point, Point3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_display_uses_separator() {
        assert_eq!(Point3::new(0.0, -52.0, 26.5).to_string(), "0_-52_26.5");
    }

    #[test]
    fn test_distance_and_within() {
        let origin = Point3::new(0.0, 0.0, 0.0);
        let p = Point3::new(3.0, 4.0, 0.0);
        assert!((origin.distance_to(&p) - 5.0).abs() < f64::EPSILON);
        assert!(origin.is_within(&p, 5.0));
        assert!(!origin.is_within(&p, 4.999));
        assert!(origin.is_within(&origin, 0.0));
        assert!(!origin.is_within(&origin, -1.0));
    }

    proptest! {
        #[test]
        fn prop_displayed_points_parse(
            x in -1.0e6_f64..1.0e6,
            y in -1.0e6_f64..1.0e6,
            z in -1.0e6_f64..1.0e6,
        ) {
            let point = Point3::new(x, y, z);
            prop_assert_eq!(Point3::parse(&point.to_string()), Ok(point));
        }

        #[test]
        fn prop_wrong_part_count_rejected(parts in prop::collection::vec(-100i32..100, 0..8)) {
            prop_assume!(parts.len() != 3);
            let token = parts
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("_");
            prop_assert!(Point3::parse(&token).is_err());
        }
    }
}
