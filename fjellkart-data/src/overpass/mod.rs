//! Overpass API adapter.
//!
//! Queries are rendered from the router's tag selectors as a union of `nwr`
//! statements over the viewport, returning element centres and tags.

mod dto;
mod http_source;
mod query;

pub use http_source::{
    DEFAULT_OVERPASS_ENDPOINT, DEFAULT_QUERY_TIMEOUT_SECS, OverpassHttpSource,
    OverpassSourceConfig,
};
pub use query::build_query;
