//! In-memory `CityStore` and `PoiStore` implementations used by unit and
//! behaviour tests.

use std::sync::{Mutex, MutexGuard};

use crate::{
    City, CityStore, GeoError, LatLon, NewCity, PoiStore, PointOfInterest, SphereIndex,
    StorageError, store::INDEXED_FIELD,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, store: &'static str) -> Result<MutexGuard<'a, T>, GeoError> {
    mutex
        .lock()
        .map_err(|_| GeoError::Storage(StorageError::Poisoned { store }))
}

/// In-memory city table with the same uniqueness rules as the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryCityStore {
    cities: Mutex<Vec<City>>,
}

impl MemoryCityStore {
    /// Create a store holding `cities`. Invalid or duplicate entries are
    /// skipped.
    #[must_use]
    pub fn with_cities<I>(cities: I) -> Self
    where
        I: IntoIterator<Item = NewCity>,
    {
        let store = Self::default();
        for city in cities {
            // Duplicates and invalid rows are dropped like `INSERT OR IGNORE`.
            let _ignored = store.insert_city(city);
        }
        store
    }
}

impl CityStore for MemoryCityStore {
    fn list_cities(&self) -> Result<Vec<City>, GeoError> {
        let mut cities = lock(&self.cities, "cities")?.clone();
        cities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cities)
    }

    fn find_city_by_name(&self, name: &str) -> Result<Option<City>, GeoError> {
        Ok(lock(&self.cities, "cities")?
            .iter()
            .find(|city| city.name == name)
            .cloned())
    }

    fn insert_city(&self, city: NewCity) -> Result<City, GeoError> {
        let city = city.validated()?;
        let mut cities = lock(&self.cities, "cities")?;
        if cities.iter().any(|existing| existing.name == city.name) {
            return Err(GeoError::DuplicateKey {
                entity: "city",
                key: city.name,
            });
        }
        let id = cities.iter().map(|existing| existing.id).max().unwrap_or(0) + 1;
        let stored = City {
            id,
            name: city.name,
            state_code: city.state_code,
            population: city.population,
        };
        cities.push(stored.clone());
        Ok(stored)
    }
}

/// In-memory points collection.
///
/// Performs linear scans and is intended only for small datasets. A store
/// built with [`MemoryPoiStore::without_index`] behaves like a collection
/// whose spherical index was never created.
#[derive(Debug)]
pub struct MemoryPoiStore {
    points: Mutex<Vec<PointOfInterest>>,
    indexed: bool,
}

impl Default for MemoryPoiStore {
    fn default() -> Self {
        Self::with_points(Vec::new())
    }
}

impl MemoryPoiStore {
    /// Create an indexed store from a collection of points.
    #[must_use]
    pub fn with_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = PointOfInterest>,
    {
        Self {
            points: Mutex::new(points.into_iter().collect()),
            indexed: true,
        }
    }

    /// Create a store whose proximity queries fail with a missing index.
    #[must_use]
    pub fn without_index<I>(points: I) -> Self
    where
        I: IntoIterator<Item = PointOfInterest>,
    {
        Self {
            indexed: false,
            ..Self::with_points(points)
        }
    }
}

impl PoiStore for MemoryPoiStore {
    fn find_by_city(&self, city_name: &str) -> Result<Vec<PointOfInterest>, GeoError> {
        Ok(lock(&self.points, "points of interest")?
            .iter()
            .filter(|poi| poi.city.name() == city_name)
            .cloned()
            .collect())
    }

    fn insert_point(&self, poi: &PointOfInterest) -> Result<(), GeoError> {
        poi.validate()?;
        lock(&self.points, "points of interest")?.push(poi.clone());
        Ok(())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<PointOfInterest>, GeoError> {
        Ok(lock(&self.points, "points of interest")?
            .iter()
            .find(|poi| poi.name == name)
            .cloned())
    }

    fn point_names(&self) -> Result<Vec<String>, GeoError> {
        Ok(lock(&self.points, "points of interest")?
            .iter()
            .map(|poi| poi.name.clone())
            .collect())
    }

    fn near_sphere(
        &self,
        center: LatLon,
        max_distance_m: f64,
    ) -> Result<Vec<PointOfInterest>, GeoError> {
        if !self.indexed {
            return Err(GeoError::Storage(StorageError::MissingSpatialIndex {
                field: INDEXED_FIELD,
                path: "memory".into(),
            }));
        }
        let points = lock(&self.points, "points of interest")?;
        let index = SphereIndex::build(
            (0_i64..)
                .zip(points.iter())
                .map(|(id, poi)| (id, poi.coordinates.point.to_lat_lon())),
        );
        Ok(index
            .within(center, max_distance_m)
            .into_iter()
            .filter_map(|(id, _)| usize::try_from(id).ok())
            .filter_map(|position| points.get(position).cloned())
            .collect())
    }
}
