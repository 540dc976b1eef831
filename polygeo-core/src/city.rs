//! Relational city records and the soft reference points use to name them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{GeoError, ValidationError, store::CityStore};

/// A row of the `CIDADES` table.
///
/// # Examples
/// ```
/// use polygeo_core::City;
///
/// let city = City {
///     id: 2,
///     name: "Recife".into(),
///     state_code: "PE".into(),
///     population: 1_653_461,
/// };
/// assert_eq!(city.to_string(), "Recife (PE)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct City {
    /// Surrogate key (`id`).
    pub id: i64,
    /// Unique city name (`nome`).
    pub name: String,
    /// State abbreviation (`estado`).
    pub state_code: String,
    /// Estimated population (`populacao`).
    pub population: u64,
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.state_code)
    }
}

/// Insert payload for [`CityStore::insert_city`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCity {
    /// City name; must be non-empty.
    pub name: String,
    /// State abbreviation; must be non-empty. Stored upper-cased.
    pub state_code: String,
    /// Population; must be non-zero.
    pub population: u64,
}

impl NewCity {
    /// Build an insert payload.
    pub fn new(name: impl Into<String>, state_code: impl Into<String>, population: u64) -> Self {
        Self {
            name: name.into(),
            state_code: state_code.into(),
            population,
        }
    }

    /// Check presence of every field and normalise the state code.
    ///
    /// Only emptiness is checked; names are stored exactly as supplied.
    pub fn validated(self) -> Result<Self, ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyField { field: "name" });
        }
        if self.state_code.is_empty() {
            return Err(ValidationError::EmptyField {
                field: "state_code",
            });
        }
        if self.population == 0 {
            return Err(ValidationError::ZeroPopulation);
        }
        Ok(Self {
            state_code: self.state_code.to_uppercase(),
            ..self
        })
    }
}

/// Value-based link from a point of interest to a [`City`] by name.
///
/// The link is not enforced by either store: a point may name a city that
/// has not been registered yet, or never will be. [`CityRef::resolve`]
/// reports that as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CityRef(String);

impl CityRef {
    /// Wrap a city name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Referenced city name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Look the referenced city up in `store`.
    pub fn resolve<S>(&self, store: &S) -> Result<Option<City>, GeoError>
    where
        S: CityStore + ?Sized,
    {
        store.find_city_by_name(&self.0)
    }
}

impl std::fmt::Display for CityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CityRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
