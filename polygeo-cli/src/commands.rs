//! Subcommand handlers and their output formatting.

use std::io::Write;

use polygeo_core::{NewCity, PointOfInterest, bootstrap, great_circle_distance_km};
use tracing::warn;

use crate::{
    AddCityArgs, AddPointArgs, CliError, DistanceArgs, JoinArgs, PointsArgs, RadiusArgs,
    Service, StoreSettings,
};

/// Group the digits of `population` in threes with `.` separators.
pub(crate) fn format_population(population: u64) -> String {
    let digits = population.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (position, digit) in digits.chars().enumerate() {
        if position > 0 && (digits.len() - position) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    grouped
}

pub(crate) fn seed(settings: &StoreSettings, out: &mut impl Write) -> Result<(), CliError> {
    let (cities, points) = settings.open_stores()?;
    let report = bootstrap(&cities, &points)?;
    writeln!(
        out,
        "Seeded {} cities and {} points of interest; spatial index holds {} points.",
        report.cities_inserted, report.points_inserted, report.indexed_points
    )?;
    Ok(())
}

pub(crate) fn distance(args: &DistanceArgs, out: &mut impl Write) -> Result<(), CliError> {
    let km = great_circle_distance_km(args.lat_a, args.lon_a, args.lat_b, args.lon_b);
    writeln!(out, "Distance: {km:.2} km")?;
    Ok(())
}

pub(crate) fn radius(
    service: &Service,
    args: &RadiusArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let search = service.find_points_within_radius(args.latitude, args.longitude, args.radius_km)?;
    if let Some(diagnostic) = &search.diagnostic {
        warn!(%diagnostic, "radius search degraded");
        writeln!(out, "warning: {diagnostic}")?;
    }
    if search.points.is_empty() {
        writeln!(out, "No points of interest within {} km.", args.radius_km)?;
        return Ok(());
    }
    writeln!(
        out,
        "{} points of interest within {} km:",
        search.points.len(),
        args.radius_km
    )?;
    for poi in &search.points {
        let km = great_circle_distance_km(
            args.latitude,
            args.longitude,
            poi.coordinates.latitude,
            poi.coordinates.longitude,
        );
        writeln!(out, "- {} ({}): {km:.3} km", poi.name, poi.city)?;
    }
    Ok(())
}

pub(crate) fn join(
    service: &Service,
    args: &JoinArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let joined = service.cross_join_point_and_city(&args.name)?;
    let poi = &joined.poi;
    writeln!(out, "{}", poi.name)?;
    if !poi.description.is_empty() {
        writeln!(out, "  {}", poi.description)?;
    }
    writeln!(
        out,
        "  Coordinates: {}, {}",
        poi.coordinates.latitude, poi.coordinates.longitude
    )?;
    match &joined.city {
        Some(city) => writeln!(
            out,
            "  City: {}/{} (population {})",
            city.name,
            city.state_code,
            format_population(city.population)
        )?,
        None => writeln!(
            out,
            "warning: city {:?} is not registered in the relational store",
            poi.city.name()
        )?,
    }
    Ok(())
}

pub(crate) fn cities(service: &Service, out: &mut impl Write) -> Result<(), CliError> {
    for city in service.list_cities()? {
        writeln!(out, "{city}")?;
    }
    Ok(())
}

pub(crate) fn points(
    service: &Service,
    args: &PointsArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let Some(city) = &args.city else {
        for name in service.point_names()? {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    };
    let found = service.points_in_city(city)?;
    if found.is_empty() {
        writeln!(out, "No points of interest in {city}.")?;
    }
    for poi in found {
        if poi.description.is_empty() {
            writeln!(out, "- {}", poi.name)?;
        } else {
            writeln!(out, "- {}: {}", poi.name, poi.description)?;
        }
    }
    Ok(())
}

pub(crate) fn add_city(
    service: &Service,
    args: AddCityArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let city = service.register_city(NewCity::new(args.name, args.state, args.population))?;
    writeln!(out, "Added city {city} with id {}.", city.id)?;
    Ok(())
}

pub(crate) fn add_point(
    service: &Service,
    args: AddPointArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let poi = PointOfInterest::new(
        args.name,
        args.city,
        args.latitude,
        args.longitude,
        args.description,
    )?;
    service.register_point(&poi)?;
    writeln!(out, "Added point of interest {} in {}.", poi.name, poi.city)?;
    Ok(())
}
