//! Error types emitted by the polygeo CLI.

use std::sync::Arc;

use polygeo_core::GeoError;
use thiserror::Error;

/// Errors emitted by the polygeo CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A store or engine operation failed.
    #[error(transparent)]
    Geo(#[from] GeoError),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[from] std::io::Error),
}

impl From<polygeo_core::ValidationError> for CliError {
    fn from(err: polygeo_core::ValidationError) -> Self {
        Self::Geo(err.into())
    }
}
