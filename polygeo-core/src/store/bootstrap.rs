//! First-run setup: schema, seed rows, and the spherical index.

use log::info;

use crate::{GeoError, seed};

use super::{DocumentPoiStore, PoiStore, SqliteCityStore};

/// What [`bootstrap`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootstrapReport {
    /// Sample cities written; existing names are skipped.
    pub cities_inserted: usize,
    /// Sample points written; zero unless the collection was empty.
    pub points_inserted: usize,
    /// Entries in the spherical index after the run.
    pub indexed_points: usize,
}

/// Create the city schema, seed both stores, and build the spherical index.
///
/// Running it again is safe: cities are inserted with `INSERT OR IGNORE`,
/// points only when the collection is empty, and the index is rebuilt from
/// whatever documents exist.
///
/// # Examples
/// ```no_run
/// use polygeo_core::store::{DocumentPoiStore, SqliteCityStore, StoreConfig, bootstrap};
///
/// # fn main() -> Result<(), polygeo_core::GeoError> {
/// let cities = SqliteCityStore::open(&StoreConfig::new("data/dados_estruturados.db"))?;
/// let points = DocumentPoiStore::open(&StoreConfig::new("data/locais_geo.db"))?;
/// let report = bootstrap(&cities, &points)?;
/// println!("indexed {} points", report.indexed_points);
/// # Ok(())
/// # }
/// ```
pub fn bootstrap(
    cities: &SqliteCityStore,
    points: &DocumentPoiStore,
) -> Result<BootstrapReport, GeoError> {
    let mut report = BootstrapReport::default();

    cities.create_schema()?;
    for city in seed::sample_cities() {
        if cities.insert_if_absent(&city)? {
            report.cities_inserted += 1;
        }
    }
    info!("city table ready; {} sample cities inserted", report.cities_inserted);

    if points.count()? == 0 {
        for poi in seed::sample_points() {
            points.insert_point(&poi)?;
            report.points_inserted += 1;
        }
        info!("inserted {} sample points of interest", report.points_inserted);
    } else {
        info!("points collection already populated; skipping sample points");
    }

    report.indexed_points = points.create_spherical_index()?;
    info!(
        "2dsphere index ready with {} entries",
        report.indexed_points
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CityStore, LatLon, store::StoreConfig};
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn stores() -> (TempDir, SqliteCityStore, DocumentPoiStore) {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        let cities = SqliteCityStore::open(&StoreConfig::new(root.join("dados_estruturados.db")))
            .expect("open city store");
        let points = DocumentPoiStore::open(&StoreConfig::new(root.join("locais_geo.db")))
            .expect("open point store");
        (dir, cities, points)
    }

    #[rstest]
    fn seeds_empty_stores(stores: (TempDir, SqliteCityStore, DocumentPoiStore)) {
        let (_dir, cities, points) = stores;
        let report = bootstrap(&cities, &points).expect("bootstrap");
        assert_eq!(
            report,
            BootstrapReport {
                cities_inserted: 4,
                points_inserted: 4,
                indexed_points: 4,
            }
        );
        assert!(points.has_spherical_index());
        assert_eq!(cities.list_cities().expect("list").len(), 4);
    }

    #[rstest]
    fn second_run_changes_nothing(stores: (TempDir, SqliteCityStore, DocumentPoiStore)) {
        let (_dir, cities, points) = stores;
        bootstrap(&cities, &points).expect("first run");
        let report = bootstrap(&cities, &points).expect("second run");
        assert_eq!(report.cities_inserted, 0);
        assert_eq!(report.points_inserted, 0);
        assert_eq!(report.indexed_points, 4);
        assert_eq!(points.count().expect("count"), 4);
    }

    #[rstest]
    fn existing_points_are_kept_and_indexed(
        stores: (TempDir, SqliteCityStore, DocumentPoiStore),
    ) {
        let (_dir, cities, points) = stores;
        let own = crate::PointOfInterest::new("Farol do Cabo Branco", "João Pessoa", -7.1487, -34.7969, "")
            .expect("valid point");
        points.insert_point(&own).expect("insert");

        let report = bootstrap(&cities, &points).expect("bootstrap");
        assert_eq!(report.points_inserted, 0);
        assert_eq!(report.indexed_points, 1);
        let found = points
            .near_sphere(LatLon::new(-7.1487, -34.7969), 10.0)
            .expect("query");
        assert_eq!(found, vec![own]);
    }
}
