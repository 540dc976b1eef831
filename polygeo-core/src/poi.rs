//! Point-of-interest documents stored in the geo collection.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{CityRef, Coordinates, ValidationError};

/// A geo-tagged document in the points-of-interest collection.
///
/// Serialises to the persisted layout:
/// `{"nome_local", "cidade", "coordenadas": {...}, "descricao"}`.
///
/// # Examples
/// ```
/// use polygeo_core::PointOfInterest;
///
/// # fn main() -> Result<(), polygeo_core::ValidationError> {
/// let poi = PointOfInterest::new(
///     "Praça do Marco Zero",
///     "Recife",
///     -8.0614,
///     -34.8715,
///     "Marco inicial da cidade.",
/// )?;
/// assert_eq!(poi.city.name(), "Recife");
/// assert_eq!(poi.coordinates.point.coordinates, [-34.8715, -8.0614]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointOfInterest {
    /// Display name (`nome_local`). Not unique.
    #[cfg_attr(feature = "serde", serde(rename = "nome_local"))]
    pub name: String,
    /// Owning city, by name (`cidade`).
    #[cfg_attr(feature = "serde", serde(rename = "cidade"))]
    pub city: CityRef,
    /// Readable and GeoJSON coordinates (`coordenadas`).
    #[cfg_attr(feature = "serde", serde(rename = "coordenadas"))]
    pub coordinates: Coordinates,
    /// Free text (`descricao`).
    #[cfg_attr(feature = "serde", serde(rename = "descricao", default))]
    pub description: String,
}

impl PointOfInterest {
    /// Validate and construct a point from a latitude/longitude pair.
    pub fn new(
        name: impl Into<String>,
        city: impl Into<String>,
        latitude: f64,
        longitude: f64,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let poi = Self {
            name: name.into(),
            city: CityRef::new(city),
            coordinates: Coordinates::new(latitude, longitude),
            description: description.into(),
        };
        poi.validate()?;
        Ok(poi)
    }

    /// Check required fields and coordinate consistency.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyField { field: "name" });
        }
        if self.city.name().is_empty() {
            return Err(ValidationError::EmptyField { field: "city" });
        }
        self.coordinates.validate()
    }
}
