//! Great-circle distance on a spherical Earth.
//!
//! Distances use the haversine formula via [`geo::Haversine`], which models
//! the Earth as a sphere with the IUGG mean radius R1 (about 6371.0088 km).
//! There is no ellipsoidal correction, so results agree with other
//! spherical implementations to within the difference in radius constant.

use geo::{Distance, Haversine};

use crate::LatLon;

/// Mean Earth radius, in kilometres, assumed by [`great_circle_distance_km`].
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0088;

/// Metres per kilometre.
pub(crate) const METRES_PER_KM: f64 = 1000.0;

/// Distance in kilometres between two `(latitude, longitude)` positions.
///
/// Symmetric in its arguments and zero for identical positions.
///
/// # Examples
/// ```
/// use polygeo_core::great_circle_distance_km;
///
/// let km = great_circle_distance_km(-7.11532, -34.861, -7.2285, -35.8817);
/// assert!((112.0..116.0).contains(&km));
/// ```
#[must_use]
pub fn great_circle_distance_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    distance_between(LatLon::new(lat_a, lon_a), LatLon::new(lat_b, lon_b))
}

/// [`great_circle_distance_km`] for [`LatLon`] pairs.
#[must_use]
pub fn distance_between(a: LatLon, b: LatLon) -> f64 {
    Haversine.distance(a.to_point(), b.to_point()) / METRES_PER_KM
}
