//! Core domain and pipeline for viewport-scoped POI retrieval.
//!
//! Responsibilities:
//! - Model viewports, categories, raw source records and canonical POIs.
//! - Route categories to source queries and normalise what comes back.
//! - Cache aggregated results per viewport and pace source calls.
//!
//! Boundaries:
//! - No HTTP here; concrete adapters live in `fjellkart-data` behind the
//!   [`SourceAdapter`] port.
//! - No rendering or UI state beyond [`PublishedState`].
//!
//! Invariants:
//! - Every published [`Poi`] has valid, non-sentinel coordinates.
//! - POI ids are `source:category:external_id` and stable across fetches.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod admin;
pub mod bounds;
pub mod cache;
pub mod category;
pub mod normalizer;
pub mod pipeline;
pub mod poi;
pub mod raw;
pub mod retry;
pub mod router;
pub mod rules;
pub mod source;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

use std::sync::Arc;

/// Clock shared between the cache, normaliser and pipeline.
pub type SharedClock = Arc<dyn mockable::Clock + Send + Sync>;

pub use admin::{ADMIN_SOURCE, AdminPoiStore, AdminStoreError, MemoryAdminStore};
pub use bounds::{BoundsError, DEFAULT_QUANTIZE_PRECISION, QuantizedBounds, ViewportBounds};
pub use cache::{CacheConfig, CacheEntry, CacheHit, CacheKey, ViewportCache};
pub use category::{Category, CategoryParseError, QueryFamily, TriState};
pub use normalizer::{Normalizer, NormalizerConfig, Rejection};
pub use pipeline::{
    AggregationOutcome, AggregationPipeline, AggregationReport, AggregationRequest,
    DEFAULT_MAX_POIS, LoadMode, PipelineConfig, PipelinePorts, PipelineRuntime, PublishedState,
};
pub use poi::{Metadata, Poi};
pub use raw::{Centroid, ElementKind, RawRecord, Tags};
pub use retry::{RetryController, RetryOutcome, RetryPolicy, Sleeper, TokioSleeper};
pub use router::{CategoryRoute, QueryId, QueryTarget, SourceQuery, TagFilter, TagSelector};
pub use source::{SourceAdapter, SourceError, SourceKind, SourceRegistry};
