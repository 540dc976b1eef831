//! Error taxonomy shared by the stores and the geoprocessing engine.

use std::time::Duration;

#[cfg(feature = "store-sqlite")]
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error returned by every store and engine operation.
///
/// Variants map one-to-one onto how a caller should react: validation
/// problems are the caller's fault and are never retried, duplicate keys ask
/// the user for a different value, lookups that miss are ordinary outcomes,
/// and storage failures are logged and surfaced unchanged.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Input was malformed or missing.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// An insert collided with a uniqueness constraint.
    #[error("{entity} {key:?} already exists")]
    DuplicateKey {
        /// Kind of record, e.g. `"city"`.
        entity: &'static str,
        /// Conflicting key value.
        key: String,
    },
    /// A lookup by key found nothing.
    #[error("{entity} {key:?} was not found")]
    NotFound {
        /// Kind of record, e.g. `"point-of-interest"`.
        entity: &'static str,
        /// Key that was looked up.
        key: String,
    },
    /// A store call waited longer than the configured timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Store operation that timed out.
        operation: &'static str,
        /// Timeout in effect for the call.
        timeout: Duration,
    },
    /// Connectivity or operational failure against a store.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl GeoError {
    /// Whether this error reports a missing spherical index.
    #[must_use]
    pub const fn is_missing_spatial_index(&self) -> bool {
        matches!(
            self,
            Self::Storage(StorageError::MissingSpatialIndex { .. })
        )
    }
}

/// Rejected input. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required text field was empty.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A city was submitted without a population.
    #[error("population must be greater than zero")]
    ZeroPopulation,
    /// The population does not fit the store's integer column.
    #[error("population {population} is too large to store")]
    PopulationOutOfRange {
        /// Offending value.
        population: u64,
    },
    /// Radius searches need a strictly positive, finite radius.
    #[error("radius must be a positive number of kilometres, got {radius_km}")]
    NonPositiveRadius {
        /// Radius supplied by the caller.
        radius_km: f64,
    },
    /// Latitude outside `[-90, 90]` or not finite.
    #[error("latitude {latitude} is outside [-90, 90]")]
    LatitudeOutOfRange {
        /// Offending value.
        latitude: f64,
    },
    /// Longitude outside `[-180, 180]` or not finite.
    #[error("longitude {longitude} is outside [-180, 180]")]
    LongitudeOutOfRange {
        /// Offending value.
        longitude: f64,
    },
    /// The GeoJSON point disagrees with the readable coordinates.
    #[error(
        "GeoJSON point {point:?} does not match [longitude, latitude] = [{longitude}, {latitude}]"
    )]
    PointMismatch {
        /// Readable latitude.
        latitude: f64,
        /// Readable longitude.
        longitude: f64,
        /// Stored `[longitude, latitude]` pair.
        point: [f64; 2],
    },
}

/// Operational failure raised by a store adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The spherical index has not been created for the collection.
    #[error("no 2dsphere index on {field}; expected index artefact at {path}")]
    MissingSpatialIndex {
        /// Indexed document field.
        field: &'static str,
        /// Where the index artefact was expected.
        path: String,
    },
    /// A store lock was poisoned by a panicking thread.
    #[error("{store} connection lock was poisoned")]
    Poisoned {
        /// Store whose lock was poisoned.
        store: &'static str,
    },
    /// Opening the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Creating the parent directory of a store file failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to create parent directory {path}: {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Preparing or executing a statement failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to {operation}: {source}")]
    Query {
        /// Description of the failed operation.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A stored document could not be decoded or encoded.
    #[cfg(feature = "serde")]
    #[error("malformed document {id}: {source}")]
    Document {
        /// Row identifier of the document.
        id: i64,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// The spherical index references a document that no longer exists.
    #[error("document {id} listed in the spherical index is missing from the collection")]
    IndexedDocumentMissing {
        /// Identifier of the missing document.
        id: i64,
    },
    /// Reading or validating the persisted index failed.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    SpatialIndex(#[from] crate::store::SpatialIndexError),
    /// Writing the persisted index failed.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    SpatialIndexWrite(#[from] crate::store::SpatialIndexWriteError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn missing_index_is_detected() {
        let err = GeoError::from(StorageError::MissingSpatialIndex {
            field: "coordenadas.ponto",
            path: "locais_geo.2dsphere".into(),
        });
        assert!(err.is_missing_spatial_index());
    }

    #[rstest]
    fn other_storage_errors_are_not_missing_index() {
        let err = GeoError::from(StorageError::Poisoned { store: "cities" });
        assert!(!err.is_missing_spatial_index());
    }

    #[rstest]
    fn not_found_names_entity_and_key() {
        let err = GeoError::NotFound {
            entity: "point-of-interest",
            key: "Nonexistent Place".into(),
        };
        assert_eq!(
            err.to_string(),
            "point-of-interest \"Nonexistent Place\" was not found"
        );
    }
}
