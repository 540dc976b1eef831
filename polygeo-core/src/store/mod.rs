//! Data access traits for the relational and geo stores.
//!
//! [`CityStore`] fronts the relational `CIDADES` table; [`PoiStore`] fronts
//! the collection of geo-tagged documents. The two stores know nothing about
//! each other; the only link between their records is the soft
//! [`CityRef`](crate::CityRef) carried by each point.
//!
//! Both traits require `Send + Sync` so a single handle can serve concurrent
//! callers. Implementations own their connection and release it on drop.

use crate::{City, GeoError, LatLon, NewCity, PointOfInterest, distance::METRES_PER_KM};

#[cfg(feature = "store-sqlite")]
mod bootstrap;
#[cfg(feature = "store-sqlite")]
mod city;
#[cfg(feature = "store-sqlite")]
mod connection;
#[cfg(feature = "store-sqlite")]
mod document;
mod spatial_index;

#[cfg(feature = "store-sqlite")]
pub use bootstrap::{BootstrapReport, bootstrap};
#[cfg(feature = "store-sqlite")]
pub use city::SqliteCityStore;
#[cfg(feature = "store-sqlite")]
pub use connection::{DEFAULT_TIMEOUT, StoreConfig};
#[cfg(feature = "store-sqlite")]
pub use document::{DocumentPoiStore, spatial_index_path};
#[cfg(feature = "store-sqlite")]
pub use spatial_index::{SpatialIndexError, SpatialIndexWriteError};
pub use spatial_index::{INDEXED_FIELD, SphereIndex};

/// Typed access to the city table.
///
/// # Examples
///
/// ```rust
/// use polygeo_core::{CityStore, NewCity, test_support::MemoryCityStore};
///
/// # fn main() -> Result<(), polygeo_core::GeoError> {
/// let store = MemoryCityStore::default();
/// store.insert_city(NewCity::new("Recife", "pe", 1_653_461))?;
///
/// let recife = store.find_city_by_name("Recife")?.expect("inserted above");
/// assert_eq!(recife.state_code, "PE");
/// # Ok(())
/// # }
/// ```
pub trait CityStore: Send + Sync {
    /// Every city, sorted by name ascending.
    fn list_cities(&self) -> Result<Vec<City>, GeoError>;

    /// The city whose name equals `name` exactly, if any.
    fn find_city_by_name(&self, name: &str) -> Result<Option<City>, GeoError>;

    /// Insert a city and return the stored row.
    ///
    /// Fails with [`GeoError::Validation`] when a field is empty or the
    /// population is zero, and with [`GeoError::DuplicateKey`] when the name
    /// already exists.
    fn insert_city(&self, city: NewCity) -> Result<City, GeoError>;
}

/// Access to the collection of geo-tagged documents.
///
/// Implementers maintain a spherical index over each document's GeoJSON
/// point. Proximity queries go through that index and fail with
/// [`StorageError::MissingSpatialIndex`](crate::StorageError::MissingSpatialIndex)
/// when it has not been created.
pub trait PoiStore: Send + Sync {
    /// Points whose `cidade` equals `city_name` exactly, in no particular
    /// order.
    fn find_by_city(&self, city_name: &str) -> Result<Vec<PointOfInterest>, GeoError>;

    /// Store a new document. Duplicate names are allowed.
    fn insert_point(&self, poi: &PointOfInterest) -> Result<(), GeoError>;

    /// The first stored point whose name equals `name` exactly, if any.
    fn find_by_name(&self, name: &str) -> Result<Option<PointOfInterest>, GeoError>;

    /// Names of every stored point, in insertion order.
    fn point_names(&self) -> Result<Vec<String>, GeoError>;

    /// Points within `max_distance_m` metres of `center` on the sphere,
    /// nearest first.
    fn near_sphere(
        &self,
        center: LatLon,
        max_distance_m: f64,
    ) -> Result<Vec<PointOfInterest>, GeoError>;

    /// Points within `radius_km` kilometres of `center`, nearest first.
    fn find_within_radius(
        &self,
        center: LatLon,
        radius_km: f64,
    ) -> Result<Vec<PointOfInterest>, GeoError> {
        self.near_sphere(center, radius_km * METRES_PER_KM)
    }
}
