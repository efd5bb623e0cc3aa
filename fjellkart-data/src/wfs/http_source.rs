//! Reqwest-backed WFS source adapter.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use fjellkart_core::{QueryTarget, RawRecord, SourceAdapter, SourceError, SourceQuery, ViewportBounds};
use log::debug;
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;

use super::geojson::FeatureCollectionDto;
use crate::http::{
    DEFAULT_USER_AGENT, SourceBuildError, build_client, cancellable, malformed,
    map_status_error, map_transport_error, parse_endpoint,
};

/// Default `count` limit per `GetFeature` request.
pub const DEFAULT_MAX_FEATURES: u32 = 500;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_DATASETS: [(&str, &str); 2] = [
    ("naturvern", "https://wfs.geonorge.no/skwms1/wfs.naturvernomrader"),
    ("kulturminner", "https://wfs.geonorge.no/skwms1/wfs.kulturminner"),
];

/// Configuration for [`WfsHttpSource`].
///
/// Queries name a dataset; each dataset maps to one service endpoint.
#[derive(Debug, Clone)]
pub struct WfsSourceConfig {
    /// Service endpoint per dataset key.
    pub endpoints: BTreeMap<String, String>,
    /// HTTP client timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Maximum features requested per call.
    pub max_features: u32,
}

impl Default for WfsSourceConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_DATASETS
                .into_iter()
                .map(|(dataset, endpoint)| (dataset.to_owned(), endpoint.to_owned()))
                .collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_features: DEFAULT_MAX_FEATURES,
        }
    }
}

impl WfsSourceConfig {
    /// Configuration with no datasets.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            endpoints: BTreeMap::new(),
            ..Default::default()
        }
    }

    /// Add or replace the endpoint for `dataset`.
    #[must_use]
    pub fn with_dataset(mut self, dataset: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(dataset.into(), endpoint.into());
        self
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

    /// Set the per-request feature limit, at least one.
    #[must_use]
    pub fn with_max_features(mut self, max_features: u32) -> Self {
        self.max_features = max_features.max(1);
        self
    }
}

/// WFS adapter issuing `GetFeature` requests per dataset.
#[derive(Debug)]
pub struct WfsHttpSource {
    client: Client,
    endpoints: BTreeMap<String, Url>,
    max_features: u32,
}

impl WfsHttpSource {
    /// Build an adapter from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any endpoint is invalid or the client fails to build.
    pub fn with_config(config: WfsSourceConfig) -> Result<Self, SourceBuildError> {
        let endpoints = config
            .endpoints
            .iter()
            .map(|(dataset, endpoint)| Ok((dataset.clone(), parse_endpoint(endpoint)?)))
            .collect::<Result<BTreeMap<_, _>, SourceBuildError>>()?;
        Ok(Self {
            client: build_client(&config.user_agent, config.timeout)?,
            endpoints,
            max_features: config.max_features.max(1),
        })
    }

    fn feature_url(
        &self,
        dataset: &str,
        type_name: &str,
        bounds: &ViewportBounds,
    ) -> Result<Url, SourceError> {
        let mut url = self
            .endpoints
            .get(dataset)
            .cloned()
            .ok_or_else(|| SourceError::InvalidRequest {
                message: format!("no WFS endpoint configured for dataset {dataset}"),
            })?;
        let bbox = format!(
            "{},{},{},{},EPSG:4326",
            bounds.south(),
            bounds.west(),
            bounds.north(),
            bounds.east()
        );
        url.query_pairs_mut()
            .append_pair("service", "WFS")
            .append_pair("version", "2.0.0")
            .append_pair("request", "GetFeature")
            .append_pair("typeNames", type_name)
            .append_pair("bbox", &bbox)
            .append_pair("outputFormat", "application/json")
            .append_pair("count", &self.max_features.to_string());
        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<Vec<RawRecord>, SourceError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
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
impl SourceAdapter for WfsHttpSource {
    async fn fetch(
        &self,
        query: &SourceQuery,
        bounds: &ViewportBounds,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let QueryTarget::Wfs { dataset, type_name } = query.target else {
            return Err(SourceError::InvalidRequest {
                message: format!("{} is not a WFS query", query.id),
            });
        };
        let url = self.feature_url(dataset, type_name, bounds)?;
        debug!("wfs {}: {type_name} from {dataset}", query.id);
        cancellable(cancel, self.send(url)).await
    }
}

fn parse_records(body: &[u8]) -> Result<Vec<RawRecord>, SourceError> {
    let decoded: FeatureCollectionDto =
        serde_json::from_slice(body).map_err(|error| malformed("GeoJSON", &error))?;
    Ok(decoded.into_records())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjellkart_core::{QueryId, router};
    use rstest::{fixture, rstest};

    #[fixture]
    fn source() -> WfsHttpSource {
        WfsHttpSource::with_config(
            WfsSourceConfig::empty().with_dataset("naturvern", "http://localhost:12345/wfs?map=nv"),
        )
        .expect("source should build")
    }

    #[rstest]
    fn feature_url_carries_wfs_parameters(source: WfsHttpSource) {
        let bounds = ViewportBounds::new(60.0, 59.0, 11.0, 10.0).expect("valid bounds");
        let url = source
            .feature_url("naturvern", "naturvern:Naturvernomrade", &bounds)
            .expect("url should build");

        let pairs: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("map").map(String::as_str), Some("nv"));
        assert_eq!(pairs.get("service").map(String::as_str), Some("WFS"));
        assert_eq!(pairs.get("version").map(String::as_str), Some("2.0.0"));
        assert_eq!(pairs.get("request").map(String::as_str), Some("GetFeature"));
        assert_eq!(
            pairs.get("typeNames").map(String::as_str),
            Some("naturvern:Naturvernomrade")
        );
        assert_eq!(
            pairs.get("bbox").map(String::as_str),
            Some("59,10,60,11,EPSG:4326")
        );
        assert_eq!(
            pairs.get("outputFormat").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(pairs.get("count").map(String::as_str), Some("500"));
    }

    #[rstest]
    fn unknown_dataset_is_an_invalid_request(source: WfsHttpSource) {
        let error = source
            .feature_url("kulturminner", "kulturminner:Lokalitet", &ViewportBounds::norway())
            .expect_err("dataset is not configured");
        assert!(matches!(error, SourceError::InvalidRequest { .. }));
    }

    #[rstest]
    fn invalid_endpoint_fails_construction() {
        let result = WfsHttpSource::with_config(WfsSourceConfig::empty().with_dataset("x", "::"));
        assert!(matches!(result, Err(SourceBuildError::InvalidEndpoint { .. })));
    }

    #[rstest]
    fn default_config_covers_every_wfs_query() {
        let config = WfsSourceConfig::default();
        for id in QueryId::ALL {
            if let QueryTarget::Wfs { dataset, .. } = router::query(id).target {
                assert!(config.endpoints.contains_key(dataset), "{dataset} missing");
            }
        }
    }

    #[rstest]
    fn malformed_geojson_is_reported() {
        let error = parse_records(b"{\"features\": 3}").expect_err("decode should fail");
        assert!(error.is_malformed());
    }

    #[rstest]
    #[tokio::test]
    async fn overpass_queries_are_refused(source: WfsHttpSource) {
        let error = source
            .fetch(
                router::query(QueryId::Peaks),
                &ViewportBounds::norway(),
                &CancellationToken::new(),
            )
            .await
            .expect_err("Overpass query must be refused");
        assert!(matches!(error, SourceError::InvalidRequest { .. }));
    }
}
