//! Reqwest-backed Overpass source adapter.
//!
//! This adapter owns transport details only: query rendering, HTTP error
//! mapping and JSON decoding into raw records.

use std::time::Duration;

use async_trait::async_trait;
use fjellkart_core::{QueryTarget, RawRecord, SourceAdapter, SourceError, SourceQuery, ViewportBounds};
use log::debug;
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;

use super::dto::OverpassResponseDto;
use super::query::build_query;
use crate::http::{
    DEFAULT_USER_AGENT, SourceBuildError, build_client, cancellable, malformed,
    map_status_error, map_transport_error, parse_endpoint,
};

/// Public Overpass API interpreter.
pub const DEFAULT_OVERPASS_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Timeout directive embedded in rendered queries.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 25;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`OverpassHttpSource`].
#[derive(Debug, Clone)]
pub struct OverpassSourceConfig {
    /// Interpreter endpoint.
    pub endpoint: String,
    /// HTTP client timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Server-side timeout written into the query text.
    pub query_timeout_secs: u32,
}

impl Default for OverpassSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OVERPASS_ENDPOINT.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl OverpassSourceConfig {
    /// Create a configuration pointing at `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the HTTP client timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the server-side query timeout, at least one second.
    #[must_use]
    pub fn with_query_timeout(mut self, seconds: u32) -> Self {
        self.query_timeout_secs = seconds.max(1);
        self
    }
}

/// Overpass adapter posting queries to one interpreter endpoint.
#[derive(Debug)]
pub struct OverpassHttpSource {
    client: Client,
    endpoint: Url,
    query_timeout_secs: u32,
}

impl OverpassHttpSource {
    /// Build an adapter for `endpoint` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the client fails to build.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SourceBuildError> {
        Self::with_config(OverpassSourceConfig::new(endpoint))
    }

    /// Build an adapter from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the client fails to build.
    pub fn with_config(config: OverpassSourceConfig) -> Result<Self, SourceBuildError> {
        Ok(Self {
            client: build_client(&config.user_agent, config.timeout)?,
            endpoint: parse_endpoint(&config.endpoint)?,
            query_timeout_secs: config.query_timeout_secs.max(1),
        })
    }

    async fn send(&self, query_text: String) -> Result<Vec<RawRecord>, SourceError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("data", query_text)])
            .send()
            .await
            .map_err(|error| map_transport_error(&error))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| map_transport_error(&error))?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        parse_records(body.as_ref())
    }
}

#[async_trait]
impl SourceAdapter for OverpassHttpSource {
    async fn fetch(
        &self,
        query: &SourceQuery,
        bounds: &ViewportBounds,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let QueryTarget::Overpass { selectors } = query.target else {
            return Err(SourceError::InvalidRequest {
                message: format!("{} is not an Overpass query", query.id),
            });
        };
        let query_text = build_query(selectors, bounds, self.query_timeout_secs)?;
        debug!("overpass {}: {} selectors", query.id, selectors.len());
        cancellable(cancel, self.send(query_text)).await
    }
}

fn parse_records(body: &[u8]) -> Result<Vec<RawRecord>, SourceError> {
    let decoded: OverpassResponseDto =
        serde_json::from_slice(body).map_err(|error| malformed("Overpass JSON", &error))?;
    if let Some(remark) = decoded
        .remark
        .as_deref()
        .filter(|remark| remark.contains("runtime error"))
    {
        if remark.contains("timed out") {
            return Err(SourceError::Timeout {
                message: remark.to_owned(),
            });
        }
        return Err(SourceError::Service {
            status: 200,
            message: remark.to_owned(),
        });
    }
    Ok(decoded.into_records())
}
