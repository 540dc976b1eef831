//! SQLite-backed relational store for the `CIDADES` table.

use std::{fmt, sync::Mutex, time::Duration};

use log::debug;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{City, GeoError, NewCity};

use super::CityStore;
use super::connection::{self, StoreConfig, is_constraint_violation, query_error};

const STORE: &str = "cities";

/// Relational city store over a single SQLite table.
///
/// The table layout is fixed for compatibility with existing seed data:
/// `CIDADES(id, nome, estado, populacao)` with a unique `nome`.
pub struct SqliteCityStore {
    connection: Mutex<Connection>,
    timeout: Duration,
}

impl fmt::Debug for SqliteCityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCityStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SqliteCityStore {
    /// Open the store. The `CIDADES` table must already exist; see
    /// [`SqliteCityStore::create_schema`].
    pub fn open(config: &StoreConfig) -> Result<Self, GeoError> {
        let connection = connection::open(config)?;
        Ok(Self {
            connection: Mutex::new(connection),
            timeout: config.timeout,
        })
    }

    /// Create the `CIDADES` table if it is missing.
    pub fn create_schema(&self) -> Result<(), GeoError> {
        let connection = connection::lock(&self.connection, STORE, self.timeout)?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS CIDADES (
                    id INTEGER PRIMARY KEY,
                    nome TEXT UNIQUE NOT NULL,
                    estado TEXT NOT NULL,
                    populacao INTEGER
                )",
                [],
            )
            .map(|_| ())
            .map_err(query_error("create CIDADES table", self.timeout))
    }

    /// Insert `city` unless a city with the same name exists.
    ///
    /// Returns whether a row was written.
    pub(crate) fn insert_if_absent(&self, city: &NewCity) -> Result<bool, GeoError> {
        let connection = connection::lock(&self.connection, STORE, self.timeout)?;
        connection
            .execute(
                "INSERT OR IGNORE INTO CIDADES (nome, estado, populacao) VALUES (?1, ?2, ?3)",
                params![city.name, city.state_code, population_param(city.population)?],
            )
            .map(|written| written > 0)
            .map_err(query_error("seed city", self.timeout))
    }
}

fn population_param(population: u64) -> Result<i64, GeoError> {
    i64::try_from(population).map_err(|_| {
        GeoError::Validation(crate::ValidationError::PopulationOutOfRange { population })
    })
}

fn city_from_row(row: &Row<'_>) -> rusqlite::Result<City> {
    let population: Option<i64> = row.get(3)?;
    Ok(City {
        id: row.get(0)?,
        name: row.get(1)?,
        state_code: row.get(2)?,
        // Legacy rows may have a NULL or negative population.
        population: population.and_then(|p| u64::try_from(p).ok()).unwrap_or(0),
    })
}

impl CityStore for SqliteCityStore {
    fn list_cities(&self) -> Result<Vec<City>, GeoError> {
        let connection = connection::lock(&self.connection, STORE, self.timeout)?;
        let to_error = query_error("list cities", self.timeout);
        let mut statement = connection
            .prepare("SELECT id, nome, estado, populacao FROM CIDADES ORDER BY nome")
            .map_err(&to_error)?;
        let cities = statement
            .query_map([], city_from_row)
            .map_err(&to_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(&to_error)?;
        debug!("listed {} cities", cities.len());
        Ok(cities)
    }

    fn find_city_by_name(&self, name: &str) -> Result<Option<City>, GeoError> {
        let connection = connection::lock(&self.connection, STORE, self.timeout)?;
        connection
            .query_row(
                "SELECT id, nome, estado, populacao FROM CIDADES WHERE nome = ?1",
                [name],
                city_from_row,
            )
            .optional()
            .map_err(query_error("find city by name", self.timeout))
    }

    fn insert_city(&self, city: NewCity) -> Result<City, GeoError> {
        let city = city.validated()?;
        let population = population_param(city.population)?;
        let connection = connection::lock(&self.connection, STORE, self.timeout)?;
        match connection.execute(
            "INSERT INTO CIDADES (nome, estado, populacao) VALUES (?1, ?2, ?3)",
            params![city.name, city.state_code, population],
        ) {
            Ok(_) => {}
            Err(source) if is_constraint_violation(&source) => {
                return Err(GeoError::DuplicateKey {
                    entity: "city",
                    key: city.name,
                });
            }
            Err(source) => return Err(query_error("insert city", self.timeout)(source)),
        }
        let id = connection.last_insert_rowid();
        debug!("inserted city {} with id {id}", city.name);
        Ok(City {
            id,
            name: city.name,
            state_code: city.state_code,
            population: city.population,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ValidationError, seed};
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn store() -> (TempDir, SqliteCityStore) {
        let dir = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("dados_estruturados.db"))
            .expect("utf-8 temp path");
        let store = SqliteCityStore::open(&StoreConfig::new(path)).expect("open store");
        store.create_schema().expect("create schema");
        for city in seed::sample_cities() {
            store.insert_if_absent(&city).expect("seed city");
        }
        (dir, store)
    }

    #[rstest]
    fn lists_cities_sorted_by_name(store: (TempDir, SqliteCityStore)) {
        let (_dir, store) = store;
        let names: Vec<_> = store
            .list_cities()
            .expect("list cities")
            .into_iter()
            .map(|city| city.name)
            .collect();
        assert_eq!(names, ["Campina Grande", "João Pessoa", "Natal", "Recife"]);
    }

    #[rstest]
    fn finds_city_by_exact_name(store: (TempDir, SqliteCityStore)) {
        let (_dir, store) = store;
        let recife = store
            .find_city_by_name("Recife")
            .expect("query")
            .expect("Recife is seeded");
        assert_eq!(recife.state_code, "PE");
        assert_eq!(recife.population, 1_653_461);
        assert!(store.find_city_by_name("recife").expect("query").is_none());
        assert!(store.find_city_by_name("Recife ").expect("query").is_none());
    }

    #[rstest]
    fn duplicate_insert_leaves_table_unchanged(store: (TempDir, SqliteCityStore)) {
        let (_dir, store) = store;
        let before = store.list_cities().expect("list before");
        let err = store
            .insert_city(NewCity::new("Natal", "RN", 890_480))
            .expect_err("duplicate should fail");
        assert!(matches!(
            err,
            GeoError::DuplicateKey { entity: "city", ref key } if key == "Natal"
        ));
        assert_eq!(store.list_cities().expect("list after"), before);
    }

    #[rstest]
    fn insert_returns_stored_row(store: (TempDir, SqliteCityStore)) {
        let (_dir, store) = store;
        let city = store
            .insert_city(NewCity::new("Patos", "pb", 108_192))
            .expect("insert city");
        assert_eq!(city.state_code, "PB");
        assert_eq!(
            store.find_city_by_name("Patos").expect("query"),
            Some(city)
        );
    }

    #[rstest]
    fn insert_validates_before_writing(store: (TempDir, SqliteCityStore)) {
        let (_dir, store) = store;
        let err = store
            .insert_city(NewCity::new("", "PB", 1))
            .expect_err("empty name should fail");
        assert!(matches!(
            err,
            GeoError::Validation(ValidationError::EmptyField { field: "name" })
        ));
        assert_eq!(store.list_cities().expect("list").len(), 4);
    }

    #[rstest]
    fn reseeding_is_idempotent(store: (TempDir, SqliteCityStore)) {
        let (_dir, store) = store;
        let written = seed::sample_cities()
            .iter()
            .map(|city| store.insert_if_absent(city).expect("reseed"))
            .filter(|written| *written)
            .count();
        assert_eq!(written, 0);
    }
}
