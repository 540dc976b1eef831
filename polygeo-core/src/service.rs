//! Geoprocessing engine: radius search and the cross-store join.
//!
//! [`GeoService`] is the only type the presentation layer talks to. It owns
//! one [`CityStore`] and one [`PoiStore`] and holds no other state.

use log::{debug, warn};

use crate::{
    City, CityStore, GeoError, LatLon, NewCity, PoiStore, PointOfInterest, StorageError,
    ValidationError, distance::METRES_PER_KM,
};

/// Why a radius search returned fewer results than the data would allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchDiagnostic {
    /// The spherical index has not been created, so nothing was searched.
    MissingSpatialIndex {
        /// Indexed document field.
        field: &'static str,
        /// Where the index artefact was expected.
        path: String,
    },
}

impl std::fmt::Display for SearchDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSpatialIndex { field, path } => write!(
                f,
                "spatial index on {field} is missing (expected at {path}); run `polygeo seed`"
            ),
        }
    }
}

/// Outcome of [`GeoService::find_points_within_radius`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RadiusSearch {
    /// Matching points, nearest first.
    pub points: Vec<PointOfInterest>,
    /// Set when the search could not run against the index.
    pub diagnostic: Option<SearchDiagnostic>,
}

/// A point of interest paired with the city it names, if registered.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossJoinResult {
    /// The point found by name.
    pub poi: PointOfInterest,
    /// Its city, or `None` when the name is not in the city table.
    pub city: Option<City>,
}

/// Query layer spanning the relational and document stores.
///
/// # Examples
/// ```
/// use polygeo_core::{GeoService, seed, test_support::{MemoryCityStore, MemoryPoiStore}};
///
/// # fn main() -> Result<(), polygeo_core::GeoError> {
/// let service = GeoService::new(
///     MemoryCityStore::with_cities(seed::sample_cities()),
///     MemoryPoiStore::with_points(seed::sample_points()),
/// );
/// let joined = service.cross_join_point_and_city("Praça do Marco Zero")?;
/// assert_eq!(joined.city.map(|city| city.population), Some(1_653_461));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GeoService<C, P> {
    cities: C,
    points: P,
}

impl<C, P> GeoService<C, P>
where
    C: CityStore,
    P: PoiStore,
{
    /// Wrap already-opened stores.
    pub const fn new(cities: C, points: P) -> Self {
        Self { cities, points }
    }

    /// The city store.
    pub const fn cities(&self) -> &C {
        &self.cities
    }

    /// The points-of-interest store.
    pub const fn points(&self) -> &P {
        &self.points
    }

    /// Points within `radius_km` of the centre, nearest first.
    ///
    /// A missing spherical index does not fail the call: it yields an empty
    /// result with [`SearchDiagnostic::MissingSpatialIndex`] set. Every other
    /// store failure is returned as an error.
    pub fn find_points_within_radius(
        &self,
        center_lat: f64,
        center_lon: f64,
        radius_km: f64,
    ) -> Result<RadiusSearch, GeoError> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(ValidationError::NonPositiveRadius { radius_km }.into());
        }
        let center = LatLon::new(center_lat, center_lon).validate()?;
        let max_distance_m = radius_km * METRES_PER_KM;

        match self.points.near_sphere(center, max_distance_m) {
            Ok(points) => {
                debug!(
                    "radius search at ({center_lat}, {center_lon}) within {radius_km} km found {} points",
                    points.len()
                );
                Ok(RadiusSearch {
                    points,
                    diagnostic: None,
                })
            }
            Err(GeoError::Storage(StorageError::MissingSpatialIndex { field, path })) => {
                warn!("radius search skipped: no 2dsphere index on {field} at {path}");
                Ok(RadiusSearch {
                    points: Vec::new(),
                    diagnostic: Some(SearchDiagnostic::MissingSpatialIndex { field, path }),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Find a point by exact name and attach its city.
    ///
    /// Fails with [`GeoError::NotFound`] when no point has that name. A point
    /// naming an unregistered city is returned with `city: None`.
    pub fn cross_join_point_and_city(&self, poi_name: &str) -> Result<CrossJoinResult, GeoError> {
        let poi = self
            .points
            .find_by_name(poi_name)?
            .ok_or_else(|| GeoError::NotFound {
                entity: "point-of-interest",
                key: poi_name.to_owned(),
            })?;
        let city = poi.city.resolve(&self.cities)?;
        if city.is_none() {
            debug!("point {poi_name:?} names unregistered city {}", poi.city);
        }
        Ok(CrossJoinResult { poi, city })
    }

    /// Every city, sorted by name.
    pub fn list_cities(&self) -> Result<Vec<City>, GeoError> {
        self.cities.list_cities()
    }

    /// Points whose city name equals `city_name` exactly.
    pub fn points_in_city(&self, city_name: &str) -> Result<Vec<PointOfInterest>, GeoError> {
        self.points.find_by_city(city_name)
    }

    /// Insert a city.
    pub fn register_city(&self, city: NewCity) -> Result<City, GeoError> {
        self.cities.insert_city(city)
    }

    /// Insert a point of interest. Its city need not exist.
    pub fn register_point(&self, poi: &PointOfInterest) -> Result<(), GeoError> {
        self.points.insert_point(poi)
    }

    /// Names of every stored point.
    pub fn point_names(&self) -> Result<Vec<String>, GeoError> {
        self.points.point_names()
    }
}
