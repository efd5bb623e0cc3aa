//! Request, report and published-state types for the aggregation pipeline.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{CacheConfig, Category, NormalizerConfig, Poi, RetryPolicy, ViewportBounds};

/// Default cap on POIs published for one viewport.
pub const DEFAULT_MAX_POIS: usize = 1000;

/// How aggressively a pass may hit the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum LoadMode {
    /// User-driven viewport change with a short gap between categories.
    #[default]
    Interactive,
    /// Full-catalogue load with tiered, longer gaps.
    Background,
}

/// One viewport request.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    /// Visible area.
    pub bounds: ViewportBounds,
    /// Selected categories in the order they should load.
    pub categories: Vec<Category>,
    /// Pacing mode.
    pub mode: LoadMode,
}

impl AggregationRequest {
    /// Interactive request for `categories` over `bounds`.
    #[must_use]
    pub fn interactive<I>(bounds: ViewportBounds, categories: I) -> Self
    where
        I: IntoIterator<Item = Category>,
    {
        Self {
            bounds,
            categories: categories.into_iter().collect(),
            mode: LoadMode::Interactive,
        }
    }

    /// Background request for every category over all of Norway.
    #[must_use]
    pub fn full_catalogue() -> Self {
        Self {
            bounds: ViewportBounds::norway(),
            categories: Category::ALL.to_vec(),
            mode: LoadMode::Background,
        }
    }
}

/// What the UI observes.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "camelCase")
)]
pub struct PublishedState {
    /// POIs for the last completed request.
    pub pois: Vec<Poi>,
    /// Whether a pass is running.
    pub loading: bool,
    /// Aggregate failure message for the last pass.
    pub error: Option<String>,
    /// When the published POIs were produced.
    pub last_updated: Option<DateTime<Utc>>,
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum AggregationOutcome {
    /// Sources were queried and the result published.
    Fetched,
    /// A cached result was published.
    CacheHit,
    /// Another pass was loading; nothing happened.
    Dropped,
    /// The pass was cancelled and its result discarded.
    Cancelled,
    /// No categories were requested; an empty result was published.
    Empty,
}

/// Summary of one request, returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "camelCase")
)]
pub struct AggregationReport {
    /// How the request ended.
    pub outcome: AggregationOutcome,
    /// Distinct queries sent to a source.
    pub fetched_queries: usize,
    /// Query executions answered from an earlier category in the same pass.
    pub reused_queries: usize,
    /// Categories whose queries failed.
    pub failed_categories: Vec<Category>,
    /// Records dropped by the normaliser or as malformed responses.
    pub rejected_records: usize,
    /// POIs dropped by the per-viewport cap.
    pub truncated: usize,
    /// POIs published.
    pub published: usize,
}

impl AggregationReport {
    pub(crate) const fn new(outcome: AggregationOutcome) -> Self {
        Self {
            outcome,
            fetched_queries: 0,
            reused_queries: 0,
            failed_categories: Vec::new(),
            rejected_records: 0,
            truncated: 0,
            published: 0,
        }
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    max_pois: usize,
    interactive_delay: Duration,
    background_delays: [Duration; 3],
    retry: RetryPolicy,
    cache: CacheConfig,
    normalizer: NormalizerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pois: DEFAULT_MAX_POIS,
            interactive_delay: Duration::from_millis(500),
            background_delays: [
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
            ],
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
            normalizer: NormalizerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of POIs published per viewport.
    #[must_use]
    pub fn with_max_pois(mut self, max_pois: usize) -> Self {
        self.max_pois = max_pois;
        self
    }

    /// Gap between categories in [`LoadMode::Interactive`].
    #[must_use]
    pub fn with_interactive_delay(mut self, delay: Duration) -> Self {
        self.interactive_delay = delay;
        self
    }

    /// Gaps between categories in [`LoadMode::Background`]: after each of the
    /// first five, after each of the next five, and after every later one.
    #[must_use]
    pub fn with_background_delays(mut self, delays: [Duration; 3]) -> Self {
        self.background_delays = delays;
        self
    }

    /// Retry policy for source calls.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cache settings.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Normaliser settings.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// POI cap.
    #[must_use]
    pub const fn max_pois(&self) -> usize {
        self.max_pois
    }

    /// Retry policy.
    #[must_use]
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Cache settings.
    #[must_use]
    pub const fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    /// Normaliser settings.
    #[must_use]
    pub const fn normalizer(&self) -> &NormalizerConfig {
        &self.normalizer
    }

    /// Gap to wait after the category at `index` (0-based) in `mode`.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use fjellkart_core::{LoadMode, PipelineConfig};
    ///
    /// let config = PipelineConfig::default();
    /// assert_eq!(config.delay_after(0, LoadMode::Interactive), Duration::from_millis(500));
    /// assert_eq!(config.delay_after(4, LoadMode::Background), Duration::from_secs(1));
    /// assert_eq!(config.delay_after(5, LoadMode::Background), Duration::from_secs(2));
    /// assert_eq!(config.delay_after(10, LoadMode::Background), Duration::from_secs(3));
    /// ```
    #[must_use]
    pub const fn delay_after(&self, index: usize, mode: LoadMode) -> Duration {
        let [first, second, rest] = self.background_delays;
        match mode {
            LoadMode::Interactive => self.interactive_delay,
            LoadMode::Background if index < 5 => first,
            LoadMode::Background if index < 10 => second,
            LoadMode::Background => rest,
        }
    }
}
