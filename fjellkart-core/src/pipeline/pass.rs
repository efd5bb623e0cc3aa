//! One sequential sweep over the requested categories.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::retry::{RetryController, RetryOutcome, Sleeper};
use crate::{
    Category, Normalizer, Poi, QueryId, SourceError, SourceRegistry, ViewportBounds, router,
};

use super::{LoadMode, PipelineConfig};

/// Borrowed collaborators for a pass.
pub(super) struct PassContext<'a> {
    pub(super) sources: &'a SourceRegistry,
    pub(super) retry: &'a RetryController,
    pub(super) normalizer: &'a Normalizer,
    pub(super) sleeper: &'a dyn Sleeper,
    pub(super) config: &'a PipelineConfig,
}

/// What a pass produced before merging and capping.
#[derive(Debug, Default)]
pub(super) struct PassResult {
    pub(super) pois: Vec<Poi>,
    pub(super) succeeded: usize,
    pub(super) failed: Vec<Category>,
    pub(super) rejected: usize,
    pub(super) fetched_queries: usize,
    pub(super) reused_queries: usize,
    pub(super) cancelled: bool,
}

impl PassContext<'_> {
    /// Fetch, classify and normalise every category in order.
    ///
    /// Each query runs at most once per pass. A record from a shared query
    /// goes to the first category whose filters accept it.
    pub(super) async fn run(
        &self,
        bounds: &ViewportBounds,
        categories: &[Category],
        mode: LoadMode,
        cancel: &CancellationToken,
    ) -> PassResult {
        let mut result = PassResult::default();
        let mut executed: HashMap<QueryId, RetryOutcome> = HashMap::new();
        let mut claimed: HashSet<(QueryId, usize)> = HashSet::new();

        for (index, &category) in categories.iter().enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                return result;
            }
            let route = router::route(category);
            let mut failure: Option<SourceError> = None;
            let before = result.pois.len();

            for &id in route.queries {
                let query = router::query(id);
                if executed.contains_key(&id) {
                    result.reused_queries += 1;
                } else {
                    let outcome = self
                        .retry
                        .execute(id.as_str(), cancel, |_| self.sources.fetch(query, bounds, cancel))
                        .await;
                    result.fetched_queries += 1;
                    if outcome.error == Some(SourceError::Cancelled) {
                        result.cancelled = true;
                        return result;
                    }
                    executed.insert(id, outcome);
                }
                let Some(outcome) = executed.get(&id) else {
                    continue;
                };
                match &outcome.error {
                    Some(error) if error.is_malformed() => {
                        debug!("{id}: malformed response counted as rejected: {error}");
                        result.rejected += 1;
                    }
                    Some(error) => failure = Some(error.clone()),
                    None => {}
                }
                for (position, record) in outcome.records.iter().enumerate() {
                    if !route.accepts(&record.tags) || !claimed.insert((id, position)) {
                        continue;
                    }
                    match self.normalizer.normalize(record, category, query.source) {
                        Ok(poi) => result.pois.push(poi),
                        Err(_) => result.rejected += 1,
                    }
                }
            }

            if let Some(error) = failure {
                warn!("category {category} failed: {error}");
                result.failed.push(category);
            } else {
                debug!(
                    "category {category}: {} POIs",
                    result.pois.len().saturating_sub(before)
                );
                result.succeeded += 1;
            }

            if index + 1 < categories.len() {
                let delay = self.config.delay_after(index, mode);
                let interrupted = tokio::select! {
                    biased;
                    () = cancel.cancelled() => true,
                    () = self.sleeper.sleep(delay) => false,
                };
                if interrupted {
                    result.cancelled = true;
                    return result;
                }
            }
        }
        result
    }
}

/// Drop repeated POI ids, keeping the first occurrence.
pub(super) fn dedupe_by_id(pois: Vec<Poi>) -> Vec<Poi> {
    let mut seen = HashSet::with_capacity(pois.len());
    pois.into_iter()
        .filter(|poi| seen.insert(poi.id.clone()))
        .collect()
}

/// Keep the first `max` POIs, returning how many were dropped.
pub(super) fn truncate(pois: &mut Vec<Poi>, max: usize) -> usize {
    let dropped = pois.len().saturating_sub(max);
    pois.truncate(max);
    dropped
}

/// Aggregate error text for the UI, or `None` when nothing failed.
pub(super) fn failure_message(failed: &[Category], total: usize) -> Option<String> {
    if failed.is_empty() {
        return None;
    }
    if failed.len() >= total {
        return Some(format!("failed to load all {total} categories"));
    }
    let names: Vec<&str> = failed.iter().map(Category::as_str).collect();
    Some(format!(
        "failed to load {} of {total} categories: {}",
        failed.len(),
        names.join(", ")
    ))
}
