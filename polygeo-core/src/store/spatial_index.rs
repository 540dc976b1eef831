//! Spherical ("2dsphere") index over document points.
//!
//! Points are embedded on the unit sphere as 3-D vectors and stored in an
//! R\*-tree. A radius query converts the surface distance into a chord
//! length, collects the candidates inside the chord's bounding cube, and
//! keeps those whose haversine distance is within the limit. Results come
//! back nearest first.
//!
//! With `store-sqlite` enabled the index can also be persisted next to a
//! document collection in the `PGSI` binary format: a 4-byte magic, a
//! little-endian `u16` version, then a `bincode` payload naming the indexed
//! field and listing `(id, longitude, latitude)` entries.

use std::f64::consts::PI;

use geo::{Distance, Haversine};
use rstar::{AABB, RTree, RTreeObject};

use crate::{LatLon, distance::EARTH_MEAN_RADIUS_KM, distance::METRES_PER_KM};

/// Document field covered by the spherical index.
pub const INDEXED_FIELD: &str = "coordenadas.ponto";

/// One indexed document position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "store-sqlite",
    derive(serde::Serialize, serde::Deserialize)
)]
pub(crate) struct IndexEntry {
    pub(crate) id: i64,
    pub(crate) longitude: f64,
    pub(crate) latitude: f64,
}

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    entry: IndexEntry,
    position: [f64; 3],
}

impl IndexedPoint {
    fn new(entry: IndexEntry) -> Self {
        Self {
            entry,
            position: unit_vector(LatLon::new(entry.latitude, entry.longitude)),
        }
    }

    const fn lat_lon(&self) -> LatLon {
        LatLon::new(self.entry.latitude, self.entry.longitude)
    }
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

fn unit_vector(position: LatLon) -> [f64; 3] {
    let phi = position.latitude.to_radians();
    let lambda = position.longitude.to_radians();
    [phi.cos() * lambda.cos(), phi.cos() * lambda.sin(), phi.sin()]
}

/// Chord length on the unit sphere spanning `max_distance_m` of surface.
fn chord_for(max_distance_m: f64) -> f64 {
    let angle = max_distance_m / (EARTH_MEAN_RADIUS_KM * METRES_PER_KM);
    if angle >= PI {
        return 2.0;
    }
    // Padding keeps rounding from dropping points sitting on the boundary;
    // the haversine check below is authoritative.
    2.0 * (angle / 2.0).sin() * (1.0 + 1e-9) + 1e-12
}

/// In-memory spherical index keyed by document id.
///
/// # Examples
/// ```
/// use polygeo_core::{LatLon, SphereIndex};
///
/// let index = SphereIndex::build([
///     (1, LatLon::new(-7.11532, -34.861)),
///     (2, LatLon::new(-8.0614, -34.8715)),
/// ]);
/// let hits = index.within(LatLon::new(-7.11532, -34.861), 2_000.0);
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].0, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SphereIndex {
    tree: RTree<IndexedPoint>,
}

impl SphereIndex {
    /// Bulk-load an index from `(id, position)` pairs.
    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (i64, LatLon)>,
    {
        Self::from_entries(entries.into_iter().map(|(id, position)| IndexEntry {
            id,
            longitude: position.longitude,
            latitude: position.latitude,
        }))
    }

    pub(crate) fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = IndexEntry>,
    {
        Self {
            tree: RTree::bulk_load(entries.into_iter().map(IndexedPoint::new).collect()),
        }
    }

    /// Add a single position.
    pub fn insert(&mut self, id: i64, position: LatLon) {
        self.tree.insert(IndexedPoint::new(IndexEntry {
            id,
            longitude: position.longitude,
            latitude: position.latitude,
        }));
    }

    /// Number of indexed positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(id, distance in metres)` for every position within
    /// `max_distance_m` of `center`, nearest first. Ties are broken by id.
    #[must_use]
    pub fn within(&self, center: LatLon, max_distance_m: f64) -> Vec<(i64, f64)> {
        if max_distance_m.is_nan() || max_distance_m < 0.0 {
            return Vec::new();
        }
        let chord = chord_for(max_distance_m);
        let [x, y, z] = unit_vector(center);
        let envelope =
            AABB::from_corners([x - chord, y - chord, z - chord], [x + chord, y + chord, z + chord]);
        let origin = center.to_point();

        let mut hits: Vec<(i64, f64)> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|point| {
                (
                    point.entry.id,
                    Haversine.distance(origin, point.lat_lon().to_point()),
                )
            })
            .filter(|(_, distance)| *distance <= max_distance_m)
            .collect();
        hits.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits
    }

    #[cfg(feature = "store-sqlite")]
    fn entries(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<_> = self.tree.iter().map(|point| point.entry).collect();
        entries.sort_unstable_by_key(|entry| entry.id);
        entries
    }
}

#[cfg(feature = "store-sqlite")]
pub use persisted::{SpatialIndexError, SpatialIndexWriteError};
#[cfg(feature = "store-sqlite")]
pub(crate) use persisted::{load_spatial_index, write_spatial_index};

#[cfg(feature = "store-sqlite")]
mod persisted {
    use std::{
        fs::File,
        io::{ErrorKind, Read},
        path::{Path, PathBuf},
    };

    use bincode::{deserialize_from, serialize_into};
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use super::{INDEXED_FIELD, IndexEntry, SphereIndex};

    /// File identifier for persisted spherical indices.
    pub(crate) const SPATIAL_INDEX_MAGIC: [u8; 4] = *b"PGSI";

    /// Supported version of the persisted index format.
    pub(crate) const SPATIAL_INDEX_VERSION: u16 = 1;

    #[derive(Debug, Serialize)]
    struct SpatialIndexFile<'a> {
        magic: [u8; 4],
        version: u16,
        field: &'a str,
        entries: Vec<IndexEntry>,
    }

    /// Payload following the header.
    #[derive(Debug, Deserialize)]
    struct SpatialIndexBody {
        field: String,
        entries: Vec<IndexEntry>,
    }

    /// Error emitted when loading or validating a persisted index.
    #[derive(Debug, Error)]
    pub enum SpatialIndexError {
        /// The index file could not be read from disk.
        #[error("failed to read spatial index from {path}: {source}")]
        Io {
            /// Location of the index artefact.
            path: PathBuf,
            /// Underlying I/O error.
            #[source]
            source: std::io::Error,
        },
        /// The payload could not be decoded.
        #[error("failed to decode spatial index from {path}: {source}")]
        Decode {
            /// Location of the index artefact.
            path: PathBuf,
            /// Decoder error returned by `bincode`.
            #[source]
            source: bincode::Error,
        },
        /// The file did not start with the expected header.
        #[error("invalid spatial index magic: expected {expected:?}, found {found:?}")]
        InvalidMagic {
            /// Expected byte sequence.
            expected: [u8; 4],
            /// Sequence read from the file.
            found: [u8; 4],
        },
        /// The file uses a format version this build cannot read.
        #[error("unsupported spatial index version {found}; supported version is {supported}")]
        UnsupportedVersion {
            /// Version present in the file header.
            found: u16,
            /// Version supported by this build.
            supported: u16,
        },
        /// The index covers a different document field.
        #[error("spatial index covers {found:?}, expected \"coordenadas.ponto\"")]
        WrongField {
            /// Field recorded in the artefact.
            found: String,
        },
    }

    /// Error emitted when writing an index to disk.
    #[derive(Debug, Error)]
    pub enum SpatialIndexWriteError {
        /// Writing bytes to disk failed.
        #[error("failed to write spatial index to {path}: {source}")]
        Io {
            /// Destination file path.
            path: PathBuf,
            /// Underlying I/O error.
            #[source]
            source: std::io::Error,
        },
        /// The index could not be encoded.
        #[error("failed to encode spatial index for {path}: {source}")]
        Encode {
            /// Destination file path.
            path: PathBuf,
            /// Encoder failure from `bincode`.
            #[source]
            source: bincode::Error,
        },
    }

    /// Persist `index` to `path`, replacing any existing artefact.
    ///
    /// The payload is written to a uniquely named sibling file and renamed
    /// into place, so readers never observe a partial index and concurrent
    /// writers never share a staging file.
    pub(crate) fn write_spatial_index(
        path: &Path,
        index: &SphereIndex,
    ) -> Result<(), SpatialIndexWriteError> {
        let io_error = |source: std::io::Error| SpatialIndexWriteError::Io {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staging = tempfile::Builder::new()
            .prefix(".2dsphere")
            .suffix(".partial")
            .tempfile_in(dir)
            .map_err(io_error)?;
        let payload = SpatialIndexFile {
            magic: SPATIAL_INDEX_MAGIC,
            version: SPATIAL_INDEX_VERSION,
            field: INDEXED_FIELD,
            entries: index.entries(),
        };
        serialize_into(staging.as_file_mut(), &payload).map_err(|source| {
            SpatialIndexWriteError::Encode {
                path: path.to_path_buf(),
                source,
            }
        })?;
        staging.as_file().sync_all().map_err(io_error)?;
        staging
            .persist(path)
            .map(drop)
            .map_err(|err| io_error(err.error))
    }

    /// Load the index at `path`, or `None` when no artefact exists.
    pub(crate) fn load_spatial_index(
        path: &Path,
    ) -> Result<Option<SphereIndex>, SpatialIndexError> {
        let io_error = |source: std::io::Error| SpatialIndexError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(source)),
        };

        let mut magic = [0_u8; 4];
        file.read_exact(&mut magic).map_err(io_error)?;
        if magic != SPATIAL_INDEX_MAGIC {
            return Err(SpatialIndexError::InvalidMagic {
                expected: SPATIAL_INDEX_MAGIC,
                found: magic,
            });
        }

        let mut version_bytes = [0_u8; 2];
        file.read_exact(&mut version_bytes).map_err(io_error)?;
        let version = u16::from_le_bytes(version_bytes);
        if version != SPATIAL_INDEX_VERSION {
            return Err(SpatialIndexError::UnsupportedVersion {
                found: version,
                supported: SPATIAL_INDEX_VERSION,
            });
        }

        let body: SpatialIndexBody =
            deserialize_from(&mut file).map_err(|source| SpatialIndexError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        if body.field != INDEXED_FIELD {
            return Err(SpatialIndexError::WrongField { found: body.field });
        }
        Ok(Some(SphereIndex::from_entries(body.entries)))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn index() -> SphereIndex {
        SphereIndex::build([
            (1, LatLon::new(-7.11532, -34.861)),
            (2, LatLon::new(-7.1189, -34.851)),
            (3, LatLon::new(-8.0614, -34.8715)),
            (4, LatLon::new(-7.2285, -35.8817)),
        ])
    }

    #[rstest]
    fn returns_nearest_first(index: SphereIndex) {
        let hits = index.within(LatLon::new(-7.1189, -34.851), 2_000.0);
        let ids: Vec<_> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(hits[0].1, 0.0);
    }

    #[rstest]
    fn excludes_points_beyond_limit(index: SphereIndex) {
        let hits = index.within(LatLon::new(-7.11532, -34.861), 100.0);
        assert_eq!(hits.len(), 1);
    }

    #[rstest]
    fn whole_sphere_limit_returns_everything(index: SphereIndex) {
        let hits = index.within(LatLon::new(40.0, 140.0), 25_000_000.0);
        assert_eq!(hits.len(), 4);
    }

    #[rstest]
    fn crosses_the_antimeridian() {
        let index = SphereIndex::build([
            (1, LatLon::new(0.0, 179.999)),
            (2, LatLon::new(0.0, -179.999)),
        ]);
        let hits = index.within(LatLon::new(0.0, 180.0), 1_000.0);
        assert_eq!(hits.len(), 2);
    }

    #[rstest]
    fn negative_limit_matches_nothing(index: SphereIndex) {
        assert!(index.within(LatLon::new(-7.11532, -34.861), -1.0).is_empty());
    }

    #[rstest]
    fn insert_extends_the_index() {
        let mut index = SphereIndex::default();
        assert!(index.is_empty());
        index.insert(9, LatLon::new(51.5, -0.12));
        assert_eq!(index.len(), 1);
        assert_eq!(index.within(LatLon::new(51.5, -0.12), 1.0).len(), 1);
    }
}
