//! Geographic primitives for analysis requests.
//!
//! Provides the [`BoundingBox`] type used to describe the area of interest
//! for a field analysis, with validation against world bounds and inverted
//! spans. Validation happens at the submission boundary so malformed
//! geometry never reaches the job store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors from bounding-box validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// Latitude outside [-90, 90].
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180].
    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// Southern edge at or above the northern edge.
    #[error("inverted latitude span: south {south} must be below north {north}")]
    InvertedLatitudeSpan { south: f64, north: f64 },

    /// Western edge at or beyond the eastern edge.
    #[error("inverted longitude span: west {west} must be left of east {east}")]
    InvertedLongitudeSpan { west: f64, east: f64 },
}

/// A geographic bounding box in decimal degrees.
///
/// Describes the area of interest for a field analysis. A box is valid when
/// both edges are within world bounds, `south < north`, and `west < east`.
///
/// # Example
///
/// ```
/// use fieldscan::geo::BoundingBox;
///
/// let field = BoundingBox::new(47.36, 47.37, 8.54, 8.55)?;
/// assert!(field.validate().is_ok());
/// # Ok::<(), fieldscan::geo::GeoError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge latitude.
    pub south: f64,
    /// Northern edge latitude.
    pub north: f64,
    /// Western edge longitude.
    pub west: f64,
    /// Eastern edge longitude.
    pub east: f64,
}

impl BoundingBox {
    /// Creates a validated bounding box.
    pub fn new(south: f64, north: f64, west: f64, east: f64) -> Result<Self, GeoError> {
        let bbox = Self {
            south,
            north,
            west,
            east,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Validates this box against world bounds and span ordering.
    ///
    /// Boxes can be constructed field-by-field (e.g. via deserialization),
    /// so the submission gateway re-validates before persisting anything.
    pub fn validate(&self) -> Result<(), GeoError> {
        for lat in [self.south, self.north] {
            if !(MIN_LAT..=MAX_LAT).contains(&lat) {
                return Err(GeoError::InvalidLatitude(lat));
            }
        }
        for lon in [self.west, self.east] {
            if !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(GeoError::InvalidLongitude(lon));
            }
        }
        if self.south >= self.north {
            return Err(GeoError::InvertedLatitudeSpan {
                south: self.south,
                north: self.north,
            });
        }
        if self.west >= self.east {
            return Err(GeoError::InvertedLongitudeSpan {
                west: self.west,
                east: self.east,
            });
        }
        Ok(())
    }

    /// Returns the center point as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}] x [{}, {}]",
            self.south, self.north, self.west, self.east
        )
    }
}
