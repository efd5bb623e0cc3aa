//! Behavioural tests for viewport aggregation.

use std::cell::RefCell;
use std::sync::Arc;

use fjellkart_core::test_support::{ImmediateSleeper, ScriptedSource, tagged_point};
use fjellkart_core::{
    AggregationOutcome, AggregationPipeline, AggregationReport, AggregationRequest, Category,
    PipelineConfig, PipelinePorts, PipelineRuntime, QueryId, SourceError, SourceKind,
    SourceRegistry, ViewportBounds,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// World state for pipeline scenarios.
#[derive(Default)]
struct PipelineWorld {
    script: RefCell<ScriptedSource>,
    source: RefCell<Option<Arc<ScriptedSource>>>,
    pipeline: RefCell<Option<Arc<AggregationPipeline>>>,
    reports: RefCell<Vec<AggregationReport>>,
}

impl PipelineWorld {
    fn script(&self, build: impl FnOnce(ScriptedSource) -> ScriptedSource) {
        let current = self.script.take();
        self.script.replace(build(current));
    }

    fn pipeline(&self) -> Arc<AggregationPipeline> {
        if let Some(pipeline) = self.pipeline.borrow().as_ref() {
            return Arc::clone(pipeline);
        }
        let source = Arc::new(self.script.take());
        let registry = SourceRegistry::new().with_adapter(SourceKind::Overpass, source.clone());
        let runtime = PipelineRuntime {
            sleeper: Arc::new(ImmediateSleeper),
            ..PipelineRuntime::default()
        };
        let pipeline = Arc::new(AggregationPipeline::new(
            PipelinePorts::new(registry),
            PipelineConfig::default(),
            runtime,
        ));
        self.source.replace(Some(source));
        self.pipeline.replace(Some(Arc::clone(&pipeline)));
        pipeline
    }

    fn request(&self, bounds: ViewportBounds, categories: &str) {
        let categories: Vec<Category> = categories
            .split(" and ")
            .map(|name| name.trim().parse().expect("known category"))
            .collect();
        let pipeline = self.pipeline();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        let report =
            runtime.block_on(pipeline.request(AggregationRequest::interactive(bounds, categories)));
        self.reports.borrow_mut().push(report);
    }
}

#[fixture]
fn world() -> PipelineWorld {
    PipelineWorld::default()
}

fn oslo() -> ViewportBounds {
    ViewportBounds::new(60.0, 59.0, 11.0, 10.0).expect("valid bounds")
}

#[given("a source with three camping sites")]
fn given_camping_sites(world: &PipelineWorld) {
    let records = vec![
        tagged_point("11", 59.2, 10.2, &[("tourism", "camp_site")]),
        tagged_point("12", 59.5, 10.5, &[("tourism", "camp_site")]),
        tagged_point("13", 59.8, 10.8, &[("tourism", "camp_site")]),
    ];
    world.script(|script| script.always(QueryId::Camping, Ok(records)));
}

#[given("a source with {count} peaks")]
fn given_peaks(world: &PipelineWorld, count: usize) {
    let records = (0..count)
        .map(|index| tagged_point(&index.to_string(), 59.5, 10.5, &[("natural", "peak")]))
        .collect();
    world.script(|script| script.always(QueryId::Peaks, Ok(records)));
}

#[given("peak lookups fail")]
fn given_peaks_fail(world: &PipelineWorld) {
    let error = SourceError::Service {
        status: 502,
        message: "bad gateway".to_owned(),
    };
    world.script(|script| script.always(QueryId::Peaks, Err(error)));
}

#[given("peak lookups are rate limited")]
fn given_peaks_rate_limited(world: &PipelineWorld) {
    let error = SourceError::RateLimited {
        message: "slow down".to_owned(),
    };
    world.script(|script| script.always(QueryId::Peaks, Err(error)));
}

#[when("I request {categories} POIs for the Oslo viewport")]
fn when_request_oslo(world: &PipelineWorld, categories: String) {
    world.request(oslo(), &categories);
}

#[when("I request {categories} POIs for a viewport inside Oslo")]
fn when_request_inside(world: &PipelineWorld, categories: String) {
    let inner = ViewportBounds::new(59.8, 59.2, 10.8, 10.2).expect("valid bounds");
    world.request(inner, &categories);
}

#[then("{count} POIs are published")]
fn then_published(world: &PipelineWorld, count: usize) {
    let pipeline = world.pipeline();
    assert_eq!(pipeline.state().pois.len(), count);
}

#[then("every POI id starts with {prefix}")]
fn then_id_prefix(world: &PipelineWorld, prefix: String) {
    let prefix = prefix.trim_matches('"');
    let state = world.pipeline().state();
    assert!(
        state.pois.iter().all(|poi| poi.id.starts_with(prefix)),
        "unexpected ids: {:?}",
        state.pois.iter().map(|poi| &poi.id).collect::<Vec<_>>()
    );
}

#[then("no error is published")]
fn then_no_error(world: &PipelineWorld) {
    assert!(world.pipeline().state().error.is_none());
}

#[then("the error is {message}")]
fn then_error(world: &PipelineWorld, message: String) {
    let expected = message.trim_matches('"');
    assert_eq!(world.pipeline().state().error.as_deref(), Some(expected));
}

#[then("the source was called {count} times")]
fn then_called(world: &PipelineWorld, count: usize) {
    let borrowed = world.source.borrow();
    let source = borrowed.as_ref().expect("source should be built");
    assert_eq!(source.call_count(), count);
}

#[then("the last request was served from cache")]
fn then_cache_hit(world: &PipelineWorld) {
    let reports = world.reports.borrow();
    let last = reports.last().expect("a request should have run");
    assert_eq!(last.outcome, AggregationOutcome::CacheHit);
}

#[then("{count} POIs were truncated")]
fn then_truncated(world: &PipelineWorld, count: usize) {
    let reports = world.reports.borrow();
    let last = reports.last().expect("a request should have run");
    assert_eq!(last.truncated, count);
}

#[scenario(path = "tests/features/viewport_pipeline.feature", index = 0)]
fn camping_sites_load(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_pipeline.feature", index = 1)]
fn zoom_in_hits_cache(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_pipeline.feature", index = 2)]
fn partial_failure_reported(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_pipeline.feature", index = 3)]
fn rate_limit_exhausts_retries(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_pipeline.feature", index = 4)]
fn oversized_results_capped(world: PipelineWorld) {
    let _ = world;
}
