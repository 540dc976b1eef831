//! Sample data loaded on first run.
//!
//! Four north-eastern Brazilian cities and four points of interest spread
//! across three of them. Natal deliberately has no points.

use crate::{NewCity, PointOfInterest};

/// Sample rows for the city table.
#[must_use]
pub fn sample_cities() -> Vec<NewCity> {
    vec![
        NewCity::new("João Pessoa", "PB", 817_512),
        NewCity::new("Recife", "PE", 1_653_461),
        NewCity::new("Natal", "RN", 890_480),
        NewCity::new("Campina Grande", "PB", 411_807),
    ]
}

const SAMPLE_POINTS: [(&str, &str, f64, f64, &str); 4] = [
    (
        "Praça da Independência",
        "João Pessoa",
        -7.11532,
        -34.861,
        "Ponto turístico central da cidade.",
    ),
    (
        "Estação Ciência",
        "João Pessoa",
        -7.1189,
        -34.851,
        "Espaço cultural e científico.",
    ),
    (
        "Praça do Marco Zero",
        "Recife",
        -8.0614,
        -34.8715,
        "Marco inicial da cidade.",
    ),
    (
        "Museu da Cidade",
        "Campina Grande",
        -7.2285,
        -35.8817,
        "Um dos principais museus de Campina Grande.",
    ),
];

/// Sample documents for the points-of-interest collection, in insertion
/// order.
#[must_use]
pub fn sample_points() -> Vec<PointOfInterest> {
    SAMPLE_POINTS
        .iter()
        .filter_map(|&(name, city, latitude, longitude, description)| {
            PointOfInterest::new(name, city, latitude, longitude, description).ok()
        })
        .collect()
}
