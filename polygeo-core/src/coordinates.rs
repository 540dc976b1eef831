//! Coordinate representations shared by the stores and the engine.
//!
//! Two orderings coexist in this crate. Human-facing fields are always
//! `(latitude, longitude)`, while GeoJSON geometry is always
//! `[longitude, latitude]`. The types below keep both explicit so that no
//! code path has to guess which order a pair of floats is in.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Latitude bounds in degrees.
const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
/// Longitude bounds in degrees.
const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// A WGS84 position in `(latitude, longitude)` order, in degrees.
///
/// Used for query centres and distance calculations.
///
/// # Examples
/// ```
/// use polygeo_core::LatLon;
///
/// let centre = LatLon::new(-7.11532, -34.861);
/// assert_eq!(centre.latitude, -7.11532);
/// assert_eq!(centre.to_point().x(), -34.861);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    /// Degrees north of the equator.
    pub latitude: f64,
    /// Degrees east of the prime meridian.
    pub longitude: f64,
}

impl LatLon {
    /// Construct a position from latitude and longitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Convert to a `geo` point (`x = longitude`, `y = latitude`).
    #[must_use]
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }

    /// Reject NaN, infinite, or out-of-range components.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !self.latitude.is_finite() || !LATITUDE_RANGE.contains(&self.latitude) {
            return Err(ValidationError::LatitudeOutOfRange {
                latitude: self.latitude,
            });
        }
        if !self.longitude.is_finite() || !LONGITUDE_RANGE.contains(&self.longitude) {
            return Err(ValidationError::LongitudeOutOfRange {
                longitude: self.longitude,
            });
        }
        Ok(self)
    }
}

/// GeoJSON geometry type tag. Only points are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GeometryKind {
    /// `"type": "Point"`.
    #[default]
    Point,
}

/// A GeoJSON point: `{"type": "Point", "coordinates": [longitude, latitude]}`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoJsonPoint {
    /// Geometry tag.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: GeometryKind,
    /// `[longitude, latitude]` in degrees.
    pub coordinates: [f64; 2],
}

impl GeoJsonPoint {
    /// Build a point from explicit longitude and latitude.
    ///
    /// The argument order follows GeoJSON on purpose.
    #[must_use]
    pub const fn from_lon_lat(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: GeometryKind::Point,
            coordinates: [longitude, latitude],
        }
    }

    /// Longitude component (`coordinates[0]`).
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    /// Latitude component (`coordinates[1]`).
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    /// The point as a [`LatLon`].
    #[must_use]
    pub const fn to_lat_lon(&self) -> LatLon {
        LatLon::new(self.latitude(), self.longitude())
    }
}

/// The `coordenadas` sub-document of a point of interest.
///
/// Carries the readable `latitude`/`longitude` pair and the indexable
/// GeoJSON `ponto`. [`Coordinates::new`] writes both from the same inputs;
/// [`Coordinates::validate`] checks that a decoded document agrees with
/// itself.
///
/// # Examples
/// ```
/// use polygeo_core::Coordinates;
///
/// let coordinates = Coordinates::new(-8.0614, -34.8715);
/// assert_eq!(coordinates.point.coordinates, [-34.8715, -8.0614]);
/// assert!(coordinates.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coordinates {
    /// Readable latitude in degrees.
    pub latitude: f64,
    /// Readable longitude in degrees.
    pub longitude: f64,
    /// GeoJSON point used by the spherical index.
    #[cfg_attr(feature = "serde", serde(rename = "ponto"))]
    pub point: GeoJsonPoint,
}

impl Coordinates {
    /// Build both representations from a latitude/longitude pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            point: GeoJsonPoint::from_lon_lat(longitude, latitude),
        }
    }

    /// Readable pair as a [`LatLon`].
    #[must_use]
    pub const fn lat_lon(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }

    /// Check ranges and that `point.coordinates == [longitude, latitude]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.lat_lon().validate()?;
        let expected = [self.longitude, self.latitude];
        if self.point.coordinates != expected {
            return Err(ValidationError::PointMismatch {
                latitude: self.latitude,
                longitude: self.longitude,
                point: self.point.coordinates,
            });
        }
        Ok(())
    }
}
