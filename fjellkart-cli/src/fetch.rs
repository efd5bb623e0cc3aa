//! Fetch command implementation for the Fjellkart CLI.

use std::io::Write;

use clap::Parser;
use fjellkart_core::{
    AggregationPipeline, AggregationRequest, Category, LoadMode, PipelineConfig, PipelinePorts,
    PipelineRuntime, PublishedState, SourceRegistry, ViewportBounds,
};
use fjellkart_data::{OverpassSourceConfig, WfsSourceConfig, default_registry};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_CATEGORY, ARG_EAST, ARG_FULL_CATALOGUE, ARG_MAX_POIS, ARG_NORTH, ARG_OVERPASS_ENDPOINT,
    ARG_SOUTH, ARG_WEST, CliError, ENV_CATEGORY, ENV_EAST, ENV_NORTH, ENV_SOUTH, ENV_WEST,
};

/// CLI arguments for the `fetch` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Aggregate POIs for the given viewport from Overpass and WFS \
                 sources and print the published state as JSON. Settings can \
                 come from CLI flags, configuration files, or environment \
                 variables.",
    about = "Fetch POIs for a viewport"
)]
#[ortho_config(prefix = "FJELLKART")]
pub(crate) struct FetchArgs {
    /// Northern edge in degrees latitude.
    #[arg(long = ARG_NORTH, value_name = "lat", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) north: Option<f64>,
    /// Southern edge in degrees latitude.
    #[arg(long = ARG_SOUTH, value_name = "lat", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) south: Option<f64>,
    /// Eastern edge in degrees longitude.
    #[arg(long = ARG_EAST, value_name = "lng", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) east: Option<f64>,
    /// Western edge in degrees longitude.
    #[arg(long = ARG_WEST, value_name = "lng", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) west: Option<f64>,
    /// Category to load; repeat or comma-separate for several.
    #[arg(long = ARG_CATEGORY, value_name = "name", value_delimiter = ',')]
    #[serde(default)]
    pub(crate) category: Option<Vec<String>>,
    /// Load every category over all of Norway with background pacing.
    #[arg(
        long = ARG_FULL_CATALOGUE,
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "bool"
    )]
    #[serde(default)]
    pub(crate) full_catalogue: Option<bool>,
    /// Overpass interpreter endpoint.
    #[arg(long = ARG_OVERPASS_ENDPOINT, value_name = "url")]
    #[serde(default)]
    pub(crate) overpass_endpoint: Option<String>,
    /// Cap on published POIs.
    #[arg(long = ARG_MAX_POIS, value_name = "count")]
    #[serde(default)]
    pub(crate) max_pois: Option<usize>,
}

impl FetchArgs {
    pub(crate) fn into_config(self) -> Result<FetchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        FetchConfig::try_from(merged)
    }
}

/// Resolved `fetch` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FetchConfig {
    /// What to aggregate.
    pub(crate) request: AggregationRequest,
    /// Overpass interpreter endpoint.
    pub(crate) overpass_endpoint: String,
    /// Pipeline settings.
    pub(crate) pipeline: PipelineConfig,
}

impl TryFrom<FetchArgs> for FetchConfig {
    type Error = CliError;

    fn try_from(args: FetchArgs) -> Result<Self, Self::Error> {
        let request = if args.full_catalogue.unwrap_or(false) {
            AggregationRequest::full_catalogue()
        } else {
            let bounds = ViewportBounds::new(
                required(args.north, ARG_NORTH, ENV_NORTH)?,
                required(args.south, ARG_SOUTH, ENV_SOUTH)?,
                required(args.east, ARG_EAST, ENV_EAST)?,
                required(args.west, ARG_WEST, ENV_WEST)?,
            )?;
            let names = args
                .category
                .filter(|names| !names.is_empty())
                .ok_or(CliError::MissingArgument {
                    field: ARG_CATEGORY,
                    env: ENV_CATEGORY,
                })?;
            let categories = names
                .iter()
                .map(|name| name.parse::<Category>())
                .collect::<Result<Vec<_>, _>>()?;
            AggregationRequest::interactive(bounds, categories)
        };

        let overpass_endpoint = args
            .overpass_endpoint
            .unwrap_or_else(|| OverpassSourceConfig::default().endpoint);
        let mut pipeline = PipelineConfig::default();
        if let Some(max_pois) = args.max_pois {
            pipeline = pipeline.with_max_pois(max_pois);
        }

        Ok(Self {
            request,
            overpass_endpoint,
            pipeline,
        })
    }
}

fn required(value: Option<f64>, field: &'static str, env: &'static str) -> Result<f64, CliError> {
    value.ok_or(CliError::MissingArgument { field, env })
}

/// Builds the source registry for the current fetch invocation.
pub(super) trait SourceRegistryBuilder {
    fn build(&self, config: &FetchConfig) -> Result<SourceRegistry, CliError>;
}

pub(super) struct HttpSourceRegistryBuilder;

impl SourceRegistryBuilder for HttpSourceRegistryBuilder {
    fn build(&self, config: &FetchConfig) -> Result<SourceRegistry, CliError> {
        let overpass = OverpassSourceConfig::new(config.overpass_endpoint.clone());
        Ok(default_registry(overpass, WfsSourceConfig::default())?)
    }
}

pub(super) fn run_fetch(args: FetchArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_fetch_with(&config, &HttpSourceRegistryBuilder, writer)
}

pub(super) fn run_fetch_with(
    config: &FetchConfig,
    builder: &dyn SourceRegistryBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let state = execute_fetch(config, builder)?;
    write_state(writer, &state)
}

fn execute_fetch(
    config: &FetchConfig,
    builder: &dyn SourceRegistryBuilder,
) -> Result<PublishedState, CliError> {
    let sources = builder.build(config)?;
    let pipeline = AggregationPipeline::new(
        PipelinePorts::new(sources),
        config.pipeline.clone(),
        PipelineRuntime::default(),
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let report = runtime.block_on(pipeline.request(config.request.clone()));
    info!(
        "{:?}: {} POIs published, {} queries fetched, {} rejected, {} failed categories",
        report.outcome,
        report.published,
        report.fetched_queries,
        report.rejected_records,
        report.failed_categories.len()
    );
    if config.request.mode == LoadMode::Background {
        info!("full catalogue load finished");
    }
    Ok(pipeline.state())
}

fn write_state(writer: &mut dyn Write, state: &PublishedState) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(state).map_err(CliError::SerialiseState)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<FetchConfig, CliError> {
    let merged = FetchArgs::merge_from_layers(layers).map_err(CliError::from)?;
    FetchConfig::try_from(merged)
}
