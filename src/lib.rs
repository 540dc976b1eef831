//! Facade crate for polygeo.
//!
//! This crate re-exports the core domain types, the geoprocessing engine, and
//! the SQLite-backed stores behind feature flags.

#![forbid(unsafe_code)]

pub use polygeo_core::{
    City, CityRef, CityStore, Coordinates, CrossJoinResult, EARTH_MEAN_RADIUS_KM, GeoError,
    GeoJsonPoint, GeoService, GeometryKind, LatLon, NewCity, PoiStore, PointOfInterest,
    RadiusSearch, SearchDiagnostic, SphereIndex, StorageError, ValidationError, distance_between,
    great_circle_distance_km,
};

#[cfg(feature = "store-sqlite")]
pub use polygeo_core::{
    BootstrapReport, DocumentPoiStore, SqliteCityStore, StoreConfig, bootstrap,
};
