//! Transport plumbing shared by the HTTP adapters.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fjellkart_core::{SourceError, SourceKind, SourceRegistry};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{OverpassHttpSource, OverpassSourceConfig, WfsHttpSource, WfsSourceConfig};

/// Default user agent sent to upstream services.
pub const DEFAULT_USER_AGENT: &str = "fjellkart/0.1";

const PREVIEW_CHAR_LIMIT: usize = 160;

/// Errors raised while constructing an adapter.
#[derive(Debug, Error)]
pub enum SourceBuildError {
    /// The reqwest client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    /// A configured endpoint is not a valid URL.
    #[error("invalid endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        /// The offending endpoint string.
        endpoint: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
}

/// Registry with both HTTP adapters built from `overpass` and `wfs`.
///
/// # Errors
///
/// Returns [`SourceBuildError`] when either adapter fails to build.
pub fn default_registry(
    overpass: OverpassSourceConfig,
    wfs: WfsSourceConfig,
) -> Result<SourceRegistry, SourceBuildError> {
    let overpass_source = OverpassHttpSource::with_config(overpass)?;
    let wfs_source = WfsHttpSource::with_config(wfs)?;
    Ok(SourceRegistry::new()
        .with_adapter(SourceKind::Overpass, Arc::new(overpass_source))
        .with_adapter(SourceKind::Wfs, Arc::new(wfs_source)))
}

pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, SourceBuildError> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()?)
}

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<url::Url, SourceBuildError> {
    url::Url::parse(endpoint).map_err(|source| SourceBuildError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        source,
    })
}

/// Run `request` unless `cancel` fires first.
pub(crate) async fn cancellable<F, T>(cancel: &CancellationToken, request: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SourceError::Cancelled),
        result = request => result,
    }
}

pub(crate) fn map_transport_error(error: &reqwest::Error) -> SourceError {
    if error.is_timeout() {
        SourceError::Timeout {
            message: error.to_string(),
        }
    } else {
        SourceError::Transport {
            message: error.to_string(),
        }
    }
}

pub(crate) fn map_status_error(status: StatusCode, body: &[u8]) -> SourceError {
    let preview = body_preview(body);
    let message = if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {preview}", status.as_u16())
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited { message },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            SourceError::Timeout { message }
        }
        _ => SourceError::Service {
            status: status.as_u16(),
            message,
        },
    }
}

pub(crate) fn malformed(context: &str, error: &serde_json::Error) -> SourceError {
    SourceError::MalformedResponse {
        message: format!("invalid {context} payload: {error}"),
    }
}

fn body_preview(body: &[u8]) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview: String = compact.chars().take(PREVIEW_CHAR_LIMIT).collect();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
