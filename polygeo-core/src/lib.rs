//! Core domain types for polygeo.
//!
//! Cities live in a relational table; points of interest live in a document
//! collection carrying GeoJSON points under a spherical index. The two are
//! linked only by city name. [`GeoService`] answers radius searches against
//! the document store and joins a point back to its city record.
//!
//! Constructors and store inserts validate their input and return `Result`
//! so invalid records never reach either store.

#![forbid(unsafe_code)]

mod city;
mod coordinates;
mod distance;
mod error;
mod poi;
pub mod seed;
mod service;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use city::{City, CityRef, NewCity};
pub use coordinates::{Coordinates, GeoJsonPoint, GeometryKind, LatLon};
pub use distance::{EARTH_MEAN_RADIUS_KM, distance_between, great_circle_distance_km};
pub use error::{GeoError, StorageError, ValidationError};
pub use poi::PointOfInterest;
pub use service::{CrossJoinResult, GeoService, RadiusSearch, SearchDiagnostic};
pub use store::{CityStore, INDEXED_FIELD, PoiStore, SphereIndex};

#[cfg(feature = "store-sqlite")]
pub use store::{
    BootstrapReport, DEFAULT_TIMEOUT, DocumentPoiStore, SpatialIndexError,
    SpatialIndexWriteError, SqliteCityStore, StoreConfig, bootstrap, spatial_index_path,
};
