//! HTTP source adapters for the POI pipeline.
//!
//! Two reqwest-backed implementations of [`fjellkart_core::SourceAdapter`]:
//!
//! - [`OverpassHttpSource`] posts tag-selector queries to an Overpass API
//!   interpreter and decodes its JSON element list.
//! - [`WfsHttpSource`] issues WFS 2.0 `GetFeature` requests and decodes the
//!   GeoJSON feature collection, reducing non-point geometries to a centroid.
//!
//! Adapters own transport details only. Retrying, pacing and validation live
//! in `fjellkart-core`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fjellkart_core::{SourceKind, SourceRegistry};
//! use fjellkart_data::{OverpassHttpSource, OverpassSourceConfig, WfsHttpSource, WfsSourceConfig};
//!
//! let overpass = OverpassHttpSource::with_config(OverpassSourceConfig::default())?;
//! let wfs = WfsHttpSource::with_config(WfsSourceConfig::default())?;
//! let sources = SourceRegistry::new()
//!     .with_adapter(SourceKind::Overpass, Arc::new(overpass))
//!     .with_adapter(SourceKind::Wfs, Arc::new(wfs));
//! # let _ = sources;
//! # Ok::<(), fjellkart_data::SourceBuildError>(())
//! ```

mod http;
pub mod overpass;
pub mod wfs;

pub use http::{DEFAULT_USER_AGENT, SourceBuildError, default_registry};
pub use overpass::{DEFAULT_OVERPASS_ENDPOINT, OverpassHttpSource, OverpassSourceConfig};
pub use wfs::{WfsHttpSource, WfsSourceConfig};
