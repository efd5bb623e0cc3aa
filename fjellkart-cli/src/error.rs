//! Error types emitted by the Fjellkart CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use fjellkart_core::{BoundsError, CategoryParseError};
use fjellkart_data::SourceBuildError;
use thiserror::Error;

/// Errors emitted by the Fjellkart CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The viewport edges do not form valid bounds.
    #[error(transparent)]
    InvalidBounds(#[from] BoundsError),
    /// A category name is not recognised.
    #[error(transparent)]
    UnknownCategory(#[from] CategoryParseError),
    /// Constructing the HTTP source adapters failed.
    #[error("failed to build POI sources: {0}")]
    BuildSources(#[from] SourceBuildError),
    /// The async runtime could not start.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Serialising the published state failed.
    #[error("failed to serialise published state: {0}")]
    SerialiseState(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
