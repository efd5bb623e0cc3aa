//! WFS 2.0 adapter for GeoJSON feature services.

mod geojson;
mod http_source;

pub use http_source::{DEFAULT_MAX_FEATURES, WfsHttpSource, WfsSourceConfig};
