//! Port for the external geodata sources POIs are fetched from.
//!
//! Adapters translate a [`SourceQuery`] plus viewport into one upstream call
//! and hand back [`RawRecord`]s. They never retry; the retry controller owns
//! that policy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{RawRecord, SourceQuery, ViewportBounds};

/// Kind of upstream service a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum SourceKind {
    /// Overpass tag-query API over OpenStreetMap data.
    Overpass,
    /// OGC Web Feature Service returning GeoJSON.
    Wfs,
}

impl SourceKind {
    /// Short name used as the first segment of POI identifiers.
    #[must_use]
    pub const fn id_prefix(&self) -> &'static str {
        match self {
            Self::Overpass => "osm",
            Self::Wfs => "wfs",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Overpass => "overpass",
            Self::Wfs => "wfs",
        })
    }
}

/// Errors surfaced by a single source call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Network transport failed before a response arrived.
    #[error("source transport failed: {message}")]
    Transport {
        /// Transport failure detail.
        message: String,
    },
    /// The call exceeded its timeout.
    #[error("source timeout: {message}")]
    Timeout {
        /// Timeout detail.
        message: String,
    },
    /// The service answered with HTTP 429.
    #[error("source rate limited request: {message}")]
    RateLimited {
        /// Rate limit detail.
        message: String,
    },
    /// The service answered with a non-success status other than 429.
    #[error("source returned status {status}: {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },
    /// The payload could not be decoded.
    #[error("source response decode failed: {message}")]
    MalformedResponse {
        /// Decoder error detail.
        message: String,
    },
    /// The adapter could not build a request for the query.
    #[error("source request invalid: {message}")]
    InvalidRequest {
        /// Validation detail.
        message: String,
    },
    /// No adapter is registered for the query's source kind.
    #[error("no adapter registered for {kind} queries")]
    Unavailable {
        /// Source kind that had no adapter.
        kind: SourceKind,
    },
    /// The call was cancelled before completing.
    #[error("source call cancelled")]
    Cancelled,
}

impl SourceError {
    /// Whether the service signalled rate limiting.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether the payload was unreadable, as opposed to the call failing.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. })
    }
}

/// Fetch raw records for one query over one viewport.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use fjellkart_core::{RawRecord, SourceAdapter, SourceError, SourceQuery, ViewportBounds};
/// use tokio_util::sync::CancellationToken;
///
/// struct EmptySource;
///
/// #[async_trait]
/// impl SourceAdapter for EmptySource {
///     async fn fetch(
///         &self,
///         _query: &SourceQuery,
///         _bounds: &ViewportBounds,
///         cancel: &CancellationToken,
///     ) -> Result<Vec<RawRecord>, SourceError> {
///         if cancel.is_cancelled() {
///             return Err(SourceError::Cancelled);
///         }
///         Ok(Vec::new())
///     }
/// }
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Execute `query` over `bounds`.
    ///
    /// Implementations should observe `cancel` and return
    /// [`SourceError::Cancelled`] promptly once it fires.
    async fn fetch(
        &self,
        query: &SourceQuery,
        bounds: &ViewportBounds,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRecord>, SourceError>;
}

/// Adapters keyed by the source kind they serve.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: HashMap<SourceKind, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` for `kind`, replacing any previous one.
    #[must_use]
    pub fn with_adapter(mut self, kind: SourceKind, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(kind, adapter);
        self
    }

    /// Adapter serving `kind`, if one is registered.
    #[must_use]
    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.get(&kind)
    }

    /// Dispatch `query` to the adapter for its source kind.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] when no adapter serves the query,
    /// otherwise whatever the adapter returns.
    pub async fn fetch(
        &self,
        query: &SourceQuery,
        bounds: &ViewportBounds,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let adapter = self
            .get(query.source)
            .ok_or(SourceError::Unavailable { kind: query.source })?;
        adapter.fetch(query, bounds, cancel).await
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.adapters.keys().map(ToString::to_string).collect();
        kinds.sort();
        f.debug_struct("SourceRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
