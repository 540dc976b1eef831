//! Command-line interface for polygeo.
//!
//! The binary is the composition root: it resolves where the two stores live,
//! opens them, hands them to a [`GeoService`], and prints results.
#![forbid(unsafe_code)]

use std::{io::Write, time::Duration};

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use ortho_config::OrthoConfig;
use polygeo_core::{DEFAULT_TIMEOUT, DocumentPoiStore, GeoService, SqliteCityStore, StoreConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

mod commands;
mod error;

pub use error::CliError;

const ARG_DATA_DIR: &str = "data-dir";
const ARG_TIMEOUT_MS: &str = "timeout-ms";
const BINARY_NAME: &str = "polygeo";

/// Relational store file inside the data directory.
pub const CITY_DB_FILE: &str = "dados_estruturados.db";
/// Document collection file inside the data directory. Its spherical index
/// lives alongside as `locais_geo.2dsphere`.
pub const POI_DB_FILE: &str = "locais_geo.db";

type Service = GeoService<SqliteCityStore, DocumentPoiStore>;

/// Run the polygeo CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let settings = cli.store.into_settings()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli.command, &settings, &mut out)
}

fn execute(
    command: Command,
    settings: &StoreSettings,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Seed => commands::seed(settings, out),
        Command::Distance(args) => commands::distance(&args, out),
        Command::Radius(args) => commands::radius(&settings.open_service()?, &args, out),
        Command::Join(args) => commands::join(&settings.open_service()?, &args, out),
        Command::Cities => commands::cities(&settings.open_service()?, out),
        Command::Points(args) => commands::points(&settings.open_service()?, &args, out),
        Command::AddCity(args) => commands::add_city(&settings.open_service()?, args, out),
        Command::AddPoint(args) => commands::add_point(&settings.open_service()?, args, out),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = BINARY_NAME,
    about = "Cities in a relational store, points of interest in a geo store, joined by name",
    version
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the city table and spherical index, and load sample data.
    Seed,
    /// Great-circle distance between two positions.
    Distance(DistanceArgs),
    /// Points of interest within a radius, nearest first.
    Radius(RadiusArgs),
    /// A point of interest together with its city.
    Join(JoinArgs),
    /// Every registered city.
    Cities,
    /// Points of interest in a city, or every point name.
    Points(PointsArgs),
    /// Register a city.
    AddCity(AddCityArgs),
    /// Register a point of interest.
    AddPoint(AddPointArgs),
}

/// Store location and timeout shared by every subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Locate the SQLite stores. Values can come from CLI flags, \
                 configuration files, or environment variables.",
    about = "Locate the polygeo stores"
)]
#[ortho_config(prefix = "POLYGEO")]
struct StoreArgs {
    /// Directory holding `dados_estruturados.db` and `locais_geo.db`.
    #[arg(long = ARG_DATA_DIR, value_name = "dir", global = true)]
    #[serde(default)]
    data_dir: Option<Utf8PathBuf>,
    /// Maximum time, in milliseconds, a store call may wait for a lock.
    #[arg(long = ARG_TIMEOUT_MS, value_name = "ms", global = true)]
    #[serde(default)]
    timeout_ms: Option<u64>,
}

impl StoreArgs {
    /// Resolve settings, taking each value from the command line first and
    /// otherwise from `POLYGEO_*` environment variables or a config file.
    fn into_settings(self) -> Result<StoreSettings, CliError> {
        // The flags were parsed with the full command tree; only the
        // environment and file layers are loaded here.
        let ambient = Self::load_from_iter([BINARY_NAME]).map_err(CliError::Configuration)?;
        Ok(StoreSettings::from(self.or(ambient)))
    }

    fn or(self, fallback: Self) -> Self {
        Self {
            data_dir: self.data_dir.or(fallback.data_dir),
            timeout_ms: self.timeout_ms.or(fallback.timeout_ms),
        }
    }
}

/// Resolved store locations.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoreSettings {
    data_dir: Utf8PathBuf,
    timeout: Duration,
}

impl From<StoreArgs> for StoreSettings {
    fn from(args: StoreArgs) -> Self {
        Self {
            data_dir: args.data_dir.unwrap_or_else(|| Utf8PathBuf::from(".")),
            timeout: args
                .timeout_ms
                .map_or(DEFAULT_TIMEOUT, Duration::from_millis),
        }
    }
}

impl StoreSettings {
    fn city_store(&self) -> StoreConfig {
        StoreConfig::new(self.data_dir.join(CITY_DB_FILE)).with_timeout(self.timeout)
    }

    fn poi_store(&self) -> StoreConfig {
        StoreConfig::new(self.data_dir.join(POI_DB_FILE)).with_timeout(self.timeout)
    }

    fn open_stores(&self) -> Result<(SqliteCityStore, DocumentPoiStore), CliError> {
        debug!(data_dir = %self.data_dir, timeout = ?self.timeout, "opening stores");
        let cities = SqliteCityStore::open(&self.city_store())?;
        let points = DocumentPoiStore::open(&self.poi_store())?;
        Ok((cities, points))
    }

    fn open_service(&self) -> Result<Service, CliError> {
        let (cities, points) = self.open_stores()?;
        Ok(GeoService::new(cities, points))
    }
}

#[derive(Debug, Args)]
struct DistanceArgs {
    /// Latitude of the first position.
    #[arg(allow_negative_numbers = true)]
    lat_a: f64,
    /// Longitude of the first position.
    #[arg(allow_negative_numbers = true)]
    lon_a: f64,
    /// Latitude of the second position.
    #[arg(allow_negative_numbers = true)]
    lat_b: f64,
    /// Longitude of the second position.
    #[arg(allow_negative_numbers = true)]
    lon_b: f64,
}

#[derive(Debug, Args)]
struct RadiusArgs {
    /// Latitude of the centre.
    #[arg(allow_negative_numbers = true)]
    latitude: f64,
    /// Longitude of the centre.
    #[arg(allow_negative_numbers = true)]
    longitude: f64,
    /// Search radius in kilometres.
    #[arg(allow_negative_numbers = true)]
    radius_km: f64,
}

#[derive(Debug, Args)]
struct JoinArgs {
    /// Exact name of the point of interest.
    name: String,
}

#[derive(Debug, Args)]
struct PointsArgs {
    /// Only list points in this city.
    #[arg(long, value_name = "name")]
    city: Option<String>,
}

#[derive(Debug, Args)]
struct AddCityArgs {
    /// City name; must be unique.
    name: String,
    /// State abbreviation, e.g. `PB`.
    state: String,
    /// Estimated population.
    population: u64,
}

#[derive(Debug, Args)]
struct AddPointArgs {
    /// Point name.
    name: String,
    /// Name of the city the point belongs to.
    city: String,
    /// Latitude in degrees.
    #[arg(allow_negative_numbers = true)]
    latitude: f64,
    /// Longitude in degrees.
    #[arg(allow_negative_numbers = true)]
    longitude: f64,
    /// Free-text description.
    #[arg(long, default_value = "")]
    description: String,
}

#[cfg(test)]
mod tests;
