//! Viewport-scoped aggregation of POIs across all sources.
//!
//! The pipeline is a small state machine, `Idle → Loading → Idle`. A request
//! arriving while a pass is loading is dropped rather than queued. Each pass
//! consults the [`ViewportCache`], then walks the requested categories in
//! order, paced to respect source rate limits, and publishes the merged
//! result on a [`watch`] channel.

mod pass;
mod state;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};
use mockable::DefaultClock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::retry::{RetryController, Sleeper, TokioSleeper};
use crate::{
    AdminPoiStore, CacheHit, Category, Normalizer, Poi, SharedClock, SourceRegistry,
    ViewportBounds, ViewportCache,
};

use pass::{PassContext, dedupe_by_id, failure_message, truncate};
pub use state::{
    AggregationOutcome, AggregationReport, AggregationRequest, DEFAULT_MAX_POIS, LoadMode,
    PipelineConfig, PublishedState,
};

/// Outbound collaborators the pipeline reads from.
#[derive(Clone, Default)]
pub struct PipelinePorts {
    /// Adapters for the external sources.
    pub sources: SourceRegistry,
    /// Optional store of admin-entered POIs.
    pub admin: Option<Arc<dyn AdminPoiStore>>,
}

impl PipelinePorts {
    /// Ports with `sources` and no admin store.
    #[must_use]
    pub fn new(sources: SourceRegistry) -> Self {
        Self {
            sources,
            admin: None,
        }
    }

    /// Attach an admin store.
    #[must_use]
    pub fn with_admin(mut self, admin: Arc<dyn AdminPoiStore>) -> Self {
        self.admin = Some(admin);
        self
    }
}

/// Time and sleep implementations.
#[derive(Clone)]
pub struct PipelineRuntime {
    /// Sleeper used for backoff and inter-category gaps.
    pub sleeper: Arc<dyn Sleeper>,
    /// Clock used for cache freshness and timestamps.
    pub clock: SharedClock,
}

impl Default for PipelineRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            clock: Arc::new(DefaultClock),
        }
    }
}

/// Clears the in-flight flag when a pass ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Aggregates POIs for viewport requests.
///
/// Share it behind an [`Arc`]; every method takes `&self`.
///
/// # Examples
/// ```
/// # tokio::runtime::Builder::new_current_thread().enable_time().build()?.block_on(async {
/// use fjellkart_core::{
///     AggregationOutcome, AggregationPipeline, AggregationRequest, PipelineConfig,
///     PipelinePorts, PipelineRuntime, SourceRegistry, ViewportBounds,
/// };
///
/// let pipeline = AggregationPipeline::new(
///     PipelinePorts::new(SourceRegistry::new()),
///     PipelineConfig::default(),
///     PipelineRuntime::default(),
/// );
/// let bounds = ViewportBounds::new(60.0, 59.0, 11.0, 10.0).expect("valid bounds");
/// let report = pipeline
///     .request(AggregationRequest::interactive(bounds, []))
///     .await;
/// assert_eq!(report.outcome, AggregationOutcome::Empty);
/// assert!(pipeline.state().pois.is_empty());
/// # });
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct AggregationPipeline {
    config: PipelineConfig,
    ports: PipelinePorts,
    sleeper: Arc<dyn Sleeper>,
    clock: SharedClock,
    retry: RetryController,
    normalizer: Normalizer,
    cache: Mutex<ViewportCache>,
    published: watch::Sender<PublishedState>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for AggregationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationPipeline")
            .field("config", &self.config)
            .field("sources", &self.ports.sources)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AggregationPipeline {
    /// Build a pipeline from its ports, settings and runtime.
    #[must_use]
    pub fn new(ports: PipelinePorts, config: PipelineConfig, runtime: PipelineRuntime) -> Self {
        let PipelineRuntime { sleeper, clock } = runtime;
        let (published, _) = watch::channel(PublishedState::default());
        Self {
            retry: RetryController::new(*config.retry(), Arc::clone(&sleeper)),
            normalizer: Normalizer::new(config.normalizer().clone(), Arc::clone(&clock)),
            cache: Mutex::new(ViewportCache::new(*config.cache(), Arc::clone(&clock))),
            published,
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
            config,
            ports,
            sleeper,
            clock,
        }
    }

    /// Observe published state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PublishedState> {
        self.published.subscribe()
    }

    /// Snapshot of the currently published state.
    #[must_use]
    pub fn state(&self) -> PublishedState {
        self.published.borrow().clone()
    }

    /// Whether a pass is currently loading.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Cancel the running pass, if any. Its results are discarded.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let token = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            info!("cancelling in-flight POI pass");
            token.cancel();
        }
    }

    /// Load POIs for `request` and publish them.
    pub async fn request(&self, request: AggregationRequest) -> AggregationReport {
        let AggregationRequest {
            bounds,
            categories: requested,
            mode,
        } = request;
        let Some(_guard) = InFlight::claim(&self.in_flight) else {
            warn!("POI pass already loading; dropping request");
            return AggregationReport::new(AggregationOutcome::Dropped);
        };

        let categories = unique_in_order(requested);
        if categories.is_empty() {
            self.publish(Vec::new(), None);
            return AggregationReport::new(AggregationOutcome::Empty);
        }

        if let Some(hit) = self.cached(&bounds, &categories) {
            let mut report = AggregationReport::new(AggregationOutcome::CacheHit);
            report.published = hit.pois.len();
            self.published.send_replace(PublishedState {
                pois: hit.pois,
                loading: false,
                error: hit.error,
                last_updated: Some(hit.fetched_at),
            });
            return report;
        }

        let (generation, cancel) = self.begin_pass();
        self.published.send_modify(|state| state.loading = true);
        info!(
            "POI pass {generation} started: {} categories, {mode:?}",
            categories.len()
        );

        let context = PassContext {
            sources: &self.ports.sources,
            retry: &self.retry,
            normalizer: &self.normalizer,
            sleeper: self.sleeper.as_ref(),
            config: &self.config,
        };
        let pass = context.run(&bounds, &categories, mode, &cancel).await;
        let mut report = AggregationReport::new(AggregationOutcome::Fetched);
        report.fetched_queries = pass.fetched_queries;
        report.reused_queries = pass.reused_queries;
        report.rejected_records = pass.rejected;
        report.failed_categories.clone_from(&pass.failed);

        let mut collected = pass.pois;
        if !pass.cancelled {
            collected.extend(self.admin_pois(&bounds, &categories).await);
        }
        let mut pois = dedupe_by_id(collected);
        report.truncated = truncate(&mut pois, self.config.max_pois());
        if report.truncated > 0 {
            warn!(
                "POI pass {generation}: dropped {} POIs over the {} cap",
                report.truncated,
                self.config.max_pois()
            );
        }

        if pass.cancelled || !self.is_current(generation, &cancel) {
            info!("POI pass {generation} cancelled; discarding results");
            self.published.send_modify(|state| state.loading = false);
            report.outcome = AggregationOutcome::Cancelled;
            return report;
        }
        self.end_pass();

        let error = failure_message(&pass.failed, categories.len());
        if pass.succeeded > 0 {
            self.cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .store_with_error(&bounds, &categories, pois.clone(), error.clone());
        }
        report.published = pois.len();
        info!(
            "POI pass {generation} finished: {} POIs, {} failed categories",
            pois.len(),
            pass.failed.len()
        );
        self.publish(pois, error);
        report
    }

    fn cached(&self, bounds: &ViewportBounds, categories: &[Category]) -> Option<CacheHit> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(bounds, categories)
    }

    fn begin_pass(&self) -> (u64, CancellationToken) {
        let cancel = CancellationToken::new();
        let generation = self.generation.load(Ordering::Acquire);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());
        (generation, cancel)
    }

    fn end_pass(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn is_current(&self, generation: u64, cancel: &CancellationToken) -> bool {
        !cancel.is_cancelled() && self.generation.load(Ordering::Acquire) == generation
    }

    async fn admin_pois(&self, bounds: &ViewportBounds, categories: &[Category]) -> Vec<Poi> {
        let Some(admin) = &self.ports.admin else {
            return Vec::new();
        };
        match admin.get_by_categories(categories).await {
            Ok(pois) => pois
                .into_iter()
                .filter(|poi| {
                    poi.has_valid_coordinates() && bounds.contains_point(poi.lat, poi.lng)
                })
                .collect(),
            Err(error) => {
                warn!("admin POIs unavailable: {error}");
                Vec::new()
            }
        }
    }

    fn publish(&self, pois: Vec<Poi>, error: Option<String>) {
        self.published.send_replace(PublishedState {
            pois,
            loading: false,
            error,
            last_updated: Some(self.clock.utc()),
        });
    }
}

fn unique_in_order(categories: Vec<Category>) -> Vec<Category> {
    let mut seen = Vec::with_capacity(categories.len());
    for category in categories {
        if !seen.contains(&category) {
            seen.push(category);
        }
    }
    seen
}
