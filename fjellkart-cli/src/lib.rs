//! Command-line interface for fetching POIs over a viewport.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod categories;
mod error;
mod fetch;

pub use error::CliError;
use fetch::FetchArgs;

pub(crate) const ARG_NORTH: &str = "north";
pub(crate) const ARG_SOUTH: &str = "south";
pub(crate) const ARG_EAST: &str = "east";
pub(crate) const ARG_WEST: &str = "west";
pub(crate) const ARG_CATEGORY: &str = "category";
pub(crate) const ARG_FULL_CATALOGUE: &str = "full-catalogue";
pub(crate) const ARG_OVERPASS_ENDPOINT: &str = "overpass-endpoint";
pub(crate) const ARG_MAX_POIS: &str = "max-pois";
pub(crate) const ENV_NORTH: &str = "FJELLKART_CMDS_FETCH_NORTH";
pub(crate) const ENV_SOUTH: &str = "FJELLKART_CMDS_FETCH_SOUTH";
pub(crate) const ENV_EAST: &str = "FJELLKART_CMDS_FETCH_EAST";
pub(crate) const ENV_WEST: &str = "FJELLKART_CMDS_FETCH_WEST";
pub(crate) const ENV_CATEGORY: &str = "FJELLKART_CMDS_FETCH_CATEGORY";

/// Run the Fjellkart CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments, configuration or the fetch fail.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Fetch(args) => fetch::run_fetch(args, &mut stdout),
        Command::Categories => categories::write_categories(&mut stdout),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "fjellkart",
    about = "Fetch outdoor points of interest for a Norwegian map viewport",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Aggregate POIs for a viewport and print the published state as JSON.
    Fetch(FetchArgs),
    /// List categories with their family and upstream queries.
    Categories,
}

#[cfg(test)]
mod tests;
