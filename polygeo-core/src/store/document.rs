//! Document collection of geo-tagged points, backed by SQLite and a persisted
//! spherical index.
//!
//! Documents live as JSON text in the `locais_geo` table. The spherical index
//! lives in a separate artefact next to the database file and only exists
//! once [`DocumentPoiStore::create_spherical_index`] has run. Inserts keep an
//! existing index in sync; they never create one.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use camino::Utf8Path;
use log::debug;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params_from_iter};

use crate::{GeoError, LatLon, PointOfInterest, StorageError};

use super::connection::{self, StoreConfig, query_error};
use super::spatial_index::{INDEXED_FIELD, SphereIndex, load_spatial_index, write_spatial_index};
use super::PoiStore;

const STORE: &str = "points of interest";

/// SQLite limits bound parameters per statement to 999 by default. Lookups
/// by id are chunked to stay below that ceiling.
const SQLITE_MAX_VARIABLE_NUMBER: usize = 999;

/// Location of the spherical index artefact for a collection database.
///
/// # Examples
/// ```
/// use camino::Utf8Path;
/// use polygeo_core::spatial_index_path;
///
/// let path = spatial_index_path(Utf8Path::new("data/locais_geo.db"));
/// assert_eq!(path.to_str(), Some("data/locais_geo.2dsphere"));
/// ```
#[must_use]
pub fn spatial_index_path(collection_path: &Utf8Path) -> PathBuf {
    collection_path.with_extension("2dsphere").into_std_path_buf()
}

/// Points-of-interest collection.
pub struct DocumentPoiStore {
    connection: Mutex<Connection>,
    index_path: PathBuf,
    timeout: Duration,
}

impl fmt::Debug for DocumentPoiStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentPoiStore")
            .field("index_path", &self.index_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DocumentPoiStore {
    /// Open the collection and create its table if missing.
    ///
    /// The spherical index is not created here.
    pub fn open(config: &StoreConfig) -> Result<Self, GeoError> {
        let connection = connection::open(config)?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS locais_geo (
                    id INTEGER PRIMARY KEY,
                    documento TEXT NOT NULL
                )",
                [],
            )
            .map_err(query_error("create locais_geo table", config.timeout))?;
        Ok(Self {
            connection: Mutex::new(connection),
            index_path: spatial_index_path(&config.path),
            timeout: config.timeout,
        })
    }

    /// Path of the spherical index artefact.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Whether the spherical index has been created.
    #[must_use]
    pub fn has_spherical_index(&self) -> bool {
        self.index_path.is_file()
    }

    /// Build the spherical index over every stored document and persist it.
    ///
    /// Rebuilding an existing index is harmless. The build holds the
    /// collection's write lock, so it cannot miss a concurrent insert.
    pub fn create_spherical_index(&self) -> Result<usize, GeoError> {
        let mut connection = connection::lock(&self.connection, STORE, self.timeout)?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error("lock collection for indexing", self.timeout))?;
        let documents = load_documents(&transaction, self.timeout)?;
        let index = SphereIndex::build(
            documents
                .iter()
                .map(|(id, poi)| (*id, poi.coordinates.point.to_lat_lon())),
        );
        write_spatial_index(&self.index_path, &index).map_err(StorageError::from)?;
        transaction
            .commit()
            .map_err(query_error("release collection after indexing", self.timeout))?;
        debug!(
            "built 2dsphere index on {INDEXED_FIELD} with {} entries",
            index.len()
        );
        Ok(index.len())
    }

    /// Number of stored documents.
    pub fn count(&self) -> Result<usize, GeoError> {
        let connection = connection::lock(&self.connection, STORE, self.timeout)?;
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM locais_geo", [], |row| row.get(0))
            .map_err(query_error("count documents", self.timeout))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn load_index(&self) -> Result<SphereIndex, GeoError> {
        load_spatial_index(&self.index_path)
            .map_err(StorageError::from)?
            .ok_or_else(|| {
                GeoError::Storage(StorageError::MissingSpatialIndex {
                    field: INDEXED_FIELD,
                    path: self.index_path.display().to_string(),
                })
            })
    }
}

fn decode(id: i64, document: &str) -> Result<PointOfInterest, GeoError> {
    serde_json::from_str(document)
        .map_err(|source| GeoError::Storage(StorageError::Document { id, source }))
}

fn load_documents(
    connection: &Connection,
    timeout: Duration,
) -> Result<Vec<(i64, PointOfInterest)>, GeoError> {
    select_documents(
        connection,
        "SELECT id, documento FROM locais_geo ORDER BY id",
        [],
        query_error("load documents", timeout),
    )
}

fn select_documents<P>(
    connection: &Connection,
    sql: &str,
    params: P,
    to_error: impl Fn(rusqlite::Error) -> GeoError,
) -> Result<Vec<(i64, PointOfInterest)>, GeoError>
where
    P: rusqlite::Params,
{
    let mut statement = connection.prepare(sql).map_err(&to_error)?;
    let rows = statement
        .query_map(params, |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
        .map_err(&to_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(&to_error)?;
    rows.into_iter()
        .map(|(id, document)| decode(id, &document).map(|poi| (id, poi)))
        .collect()
}

fn load_documents_by_id(
    connection: &Connection,
    ids: &[i64],
    timeout: Duration,
) -> Result<HashMap<i64, PointOfInterest>, GeoError> {
    let mut documents = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(SQLITE_MAX_VARIABLE_NUMBER) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("SELECT id, documento FROM locais_geo WHERE id IN ({placeholders})");
        documents.extend(select_documents(
            connection,
            &sql,
            params_from_iter(chunk.iter()),
            query_error("load indexed documents", timeout),
        )?);
    }
    Ok(documents)
}

impl PoiStore for DocumentPoiStore {
    fn find_by_city(&self, city_name: &str) -> Result<Vec<PointOfInterest>, GeoError> {
        let connection = connection::lock(&self.connection, STORE, self.timeout)?;
        let documents = select_documents(
            &connection,
            "SELECT id, documento FROM locais_geo WHERE json_extract(documento, '$.cidade') = ?1",
            [city_name],
            query_error("find points by city", self.timeout),
        )?;
        Ok(documents.into_iter().map(|(_, poi)| poi).collect())
    }

    fn insert_point(&self, poi: &PointOfInterest) -> Result<(), GeoError> {
        poi.validate()?;
        let document = serde_json::to_string(poi)
            .map_err(|source| GeoError::Storage(StorageError::Document { id: 0, source }))?;

        let mut connection = connection::lock(&self.connection, STORE, self.timeout)?;
        // The write lock spans the index rewrite so writers on other handles
        // and processes cannot interleave their read-modify-write cycles.
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error("insert point", self.timeout))?;
        let previous = load_spatial_index(&self.index_path).map_err(StorageError::from)?;
        transaction
            .execute("INSERT INTO locais_geo (documento) VALUES (?1)", [&document])
            .map_err(query_error("insert point", self.timeout))?;
        let id = transaction.last_insert_rowid();

        if let Some(previous) = &previous {
            let mut index = previous.clone();
            index.insert(id, poi.coordinates.point.to_lat_lon());
            // Dropping the transaction on failure rolls the insert back.
            write_spatial_index(&self.index_path, &index).map_err(StorageError::from)?;
        }
        if let Err(source) = transaction.commit() {
            // The row id is free again; the index must not keep pointing at it.
            if let Some(previous) = &previous {
                write_spatial_index(&self.index_path, previous).map_err(StorageError::from)?;
            }
            return Err(query_error("commit point insert", self.timeout)(source));
        }
        debug!("inserted point {:?} with id {id}", poi.name);
        Ok(())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<PointOfInterest>, GeoError> {
        let connection = connection::lock(&self.connection, STORE, self.timeout)?;
        let row = connection
            .query_row(
                "SELECT id, documento FROM locais_geo
                 WHERE json_extract(documento, '$.nome_local') = ?1
                 ORDER BY id LIMIT 1",
                [name],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(query_error("find point by name", self.timeout))?;
        row.map(|(id, document)| decode(id, &document)).transpose()
    }

    fn point_names(&self) -> Result<Vec<String>, GeoError> {
        let connection = connection::lock(&self.connection, STORE, self.timeout)?;
        let to_error = query_error("list point names", self.timeout);
        let mut statement = connection
            .prepare("SELECT json_extract(documento, '$.nome_local') FROM locais_geo ORDER BY id")
            .map_err(&to_error)?;
        let names = statement
            .query_map([], |row| row.get::<_, Option<String>>(0))
            .map_err(&to_error)?
            .filter_map(Result::transpose)
            .collect::<Result<Vec<_>, _>>()
            .map_err(&to_error)?;
        Ok(names)
    }

    fn near_sphere(
        &self,
        center: LatLon,
        max_distance_m: f64,
    ) -> Result<Vec<PointOfInterest>, GeoError> {
        let mut connection = connection::lock(&self.connection, STORE, self.timeout)?;
        // An insert renames the new index into place before it commits, so
        // the index and the rows it names are read under the same write lock.
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error("lock collection for radius search", self.timeout))?;
        let index = self.load_index()?;
        let hits = index.within(center, max_distance_m);
        debug!(
            "2dsphere query at ({}, {}) within {max_distance_m} m matched {} entries",
            center.latitude,
            center.longitude,
            hits.len()
        );

        let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
        let mut documents = load_documents_by_id(&transaction, &ids, self.timeout)?;
        drop(transaction);
        ids.into_iter()
            .map(|id| {
                documents
                    .remove(&id)
                    .ok_or_else(|| GeoError::from(StorageError::IndexedDocumentMissing { id }))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use std::{sync::Barrier, thread};
    use tempfile::TempDir;

    struct Collection {
        _dir: TempDir,
        path: Utf8PathBuf,
        store: DocumentPoiStore,
    }

    #[fixture]
    fn empty() -> Collection {
        let dir = TempDir::new().expect("create temp dir");
        let path =
            Utf8PathBuf::from_path_buf(dir.path().join("locais_geo.db")).expect("utf-8 temp path");
        let store = DocumentPoiStore::open(&StoreConfig::new(path.clone())).expect("open store");
        Collection {
            _dir: dir,
            path,
            store,
        }
    }

    #[fixture]
    fn seeded(empty: Collection) -> Collection {
        for poi in seed::sample_points() {
            empty.store.insert_point(&poi).expect("insert sample point");
        }
        empty
            .store
            .create_spherical_index()
            .expect("create spherical index");
        empty
    }

    #[rstest]
    fn radius_search_returns_nearest_first(seeded: Collection) {
        let found = seeded
            .store
            .near_sphere(LatLon::new(-7.11532, -34.861), 2_000.0)
            .expect("query");
        let names: Vec<_> = found.iter().map(|poi| poi.name.as_str()).collect();
        assert_eq!(names, ["Praça da Independência", "Estação Ciência"]);
    }

    #[rstest]
    fn radius_search_without_index_fails(empty: Collection) {
        let poi = PointOfInterest::new("Farol", "Cabedelo", -6.97, -34.83, "").expect("valid");
        empty.store.insert_point(&poi).expect("insert");
        assert!(!empty.store.has_spherical_index());
        let err = empty
            .store
            .near_sphere(LatLon::new(-6.97, -34.83), 1_000.0)
            .expect_err("no index yet");
        assert!(err.is_missing_spatial_index());
    }

    #[rstest]
    fn inserts_after_indexing_are_searchable(seeded: Collection) {
        let poi = PointOfInterest::new(
            "Busto de Tamandaré",
            "João Pessoa",
            -7.1156,
            -34.8625,
            "",
        )
        .expect("valid point");
        seeded.store.insert_point(&poi).expect("insert");
        let found = seeded
            .store
            .near_sphere(LatLon::new(-7.11532, -34.861), 500.0)
            .expect("query");
        assert!(found.iter().any(|p| p.name == "Busto de Tamandaré"));
    }

    #[rstest]
    fn concurrent_inserts_from_separate_handles_stay_indexed(seeded: Collection) {
        const WRITERS: u8 = 8;
        let barrier = Barrier::new(usize::from(WRITERS));
        thread::scope(|scope| {
            for writer in 0..WRITERS {
                let barrier = &barrier;
                let config = StoreConfig::new(seeded.path.clone());
                scope.spawn(move || {
                    let store = DocumentPoiStore::open(&config).expect("open handle");
                    let poi = PointOfInterest::new(
                        format!("Quiosque {writer}"),
                        "Cabedelo",
                        -6.97 + f64::from(writer) * 1e-4,
                        -34.83,
                        "",
                    )
                    .expect("valid point");
                    barrier.wait();
                    store.insert_point(&poi).expect("insert");
                });
            }
        });

        let found = seeded
            .store
            .near_sphere(LatLon::new(-6.97, -34.83), 5_000.0)
            .expect("query");
        let kiosks = found
            .iter()
            .filter(|poi| poi.name.starts_with("Quiosque"))
            .count();
        assert_eq!(kiosks, usize::from(WRITERS));
    }

    #[rstest]
    fn duplicate_names_are_allowed_and_first_wins(seeded: Collection) {
        let twin = PointOfInterest::new("Museu da Cidade", "Natal", -5.79, -35.2, "outro")
            .expect("valid point");
        seeded.store.insert_point(&twin).expect("insert twin");
        let found = seeded
            .store
            .find_by_name("Museu da Cidade")
            .expect("query")
            .expect("present");
        assert_eq!(found.city.name(), "Campina Grande");
        assert_eq!(
            seeded
                .store
                .point_names()
                .expect("names")
                .iter()
                .filter(|name| *name == "Museu da Cidade")
                .count(),
            2
        );
    }

    #[rstest]
    fn stores_the_persisted_document_layout(seeded: Collection) {
        drop(seeded.store);
        let connection = Connection::open(seeded.path.as_std_path()).expect("reopen");
        let raw: String = connection
            .query_row(
                "SELECT documento FROM locais_geo WHERE json_extract(documento, '$.nome_local') = ?1",
                ["Praça do Marco Zero"],
                |row| row.get(0),
            )
            .expect("row exists");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(json["cidade"], "Recife");
        assert_eq!(
            json["coordenadas"]["ponto"],
            serde_json::json!({"type": "Point", "coordinates": [-34.8715, -8.0614]})
        );
        assert_eq!(json["descricao"], "Marco inicial da cidade.");
    }

    #[rstest]
    fn corrupt_document_is_reported(seeded: Collection) {
        {
            let connection = connection::lock(&seeded.store.connection, STORE, seeded.store.timeout)
                .expect("lock");
            connection
                .execute(
                    "INSERT INTO locais_geo (documento) VALUES ('{\"nome_local\": \"Ruína\", \"cidade\": \"Recife\"}')",
                    [],
                )
                .expect("insert corrupt row");
        }
        let err = seeded
            .store
            .find_by_name("Ruína")
            .expect_err("document lacks coordinates");
        assert!(matches!(
            err,
            GeoError::Storage(StorageError::Document { .. })
        ));
    }

    #[rstest]
    fn index_pointing_at_deleted_document_is_reported(seeded: Collection) {
        {
            let connection = connection::lock(&seeded.store.connection, STORE, seeded.store.timeout)
                .expect("lock");
            connection
                .execute("DELETE FROM locais_geo WHERE id = 1", [])
                .expect("delete row");
        }
        let err = seeded
            .store
            .near_sphere(LatLon::new(-7.11532, -34.861), 2_000.0)
            .expect_err("index is stale");
        assert!(matches!(
            err,
            GeoError::Storage(StorageError::IndexedDocumentMissing { id: 1 })
        ));
    }

    #[rstest]
    fn rejects_invalid_points(empty: Collection) {
        let mut poi = PointOfInterest::new("Farol", "Cabedelo", -6.97, -34.83, "").expect("valid");
        poi.coordinates.point.coordinates = [-6.97, -34.83];
        let err = empty.store.insert_point(&poi).expect_err("swapped point");
        assert!(matches!(err, GeoError::Validation(_)));
        assert_eq!(empty.store.count().expect("count"), 0);
    }
}
