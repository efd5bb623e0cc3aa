//! Facade crate for the Fjellkart POI pipeline.
//!
//! This crate re-exports the core domain and pipeline types and exposes the
//! HTTP source adapters behind the `sources-http` feature.

#![forbid(unsafe_code)]

pub use fjellkart_core::{
    AggregationOutcome, AggregationPipeline, AggregationReport, AggregationRequest, Category,
    LoadMode, PipelineConfig, PipelinePorts, PipelineRuntime, Poi, PublishedState, QueryFamily,
    SourceAdapter, SourceError, SourceKind, SourceRegistry, ViewportBounds,
};

#[cfg(feature = "sources-http")]
pub use fjellkart_data::{
    OverpassHttpSource, OverpassSourceConfig, SourceBuildError, WfsHttpSource, WfsSourceConfig,
    default_registry,
};
