//! Test doubles for sources, time and sleeping.
//!
//! Available to this crate's own tests and, through the `test-support`
//! feature, to downstream crates.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use tokio_util::sync::CancellationToken;

pub use crate::admin::MemoryAdminStore;
use crate::{
    Category, Metadata, Poi, QueryId, RawRecord, Sleeper, SourceAdapter, SourceError,
    SourceQuery, Tags, ViewportBounds,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build a point POI with a minimal set of fields.
#[must_use]
pub fn sample_poi(id: &str, category: Category, lat: f64, lng: f64) -> Poi {
    Poi {
        id: id.to_owned(),
        name: format!("{} {id}", category.label()),
        description: category.label().to_owned(),
        category,
        lat,
        lng,
        metadata: Metadata::new(),
        source: id.split(':').next().unwrap_or_default().to_owned(),
        last_updated: DateTime::<Utc>::UNIX_EPOCH,
    }
}

/// Build a point record tagged with `pairs`.
#[must_use]
pub fn tagged_point(external_id: &str, lat: f64, lon: f64, pairs: &[(&str, &str)]) -> RawRecord {
    let tags: Tags = pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    RawRecord::point(external_id, lat, lon, tags)
}

/// Source whose responses are scripted per query.
///
/// Each query keeps a queue of responses consumed one per call. When a queue
/// runs dry the fallback response for that query is repeated, and queries
/// with neither return an empty record list.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripted: Mutex<HashMap<QueryId, VecDeque<Result<Vec<RawRecord>, SourceError>>>>,
    fallback: Mutex<HashMap<QueryId, Result<Vec<RawRecord>, SourceError>>>,
    calls: Mutex<Vec<QueryId>>,
    delay: Mutex<Option<Duration>>,
    total: AtomicUsize,
}

impl ScriptedSource {
    /// Create a source with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response for `id`.
    #[must_use]
    pub fn respond(self, id: QueryId, response: Result<Vec<RawRecord>, SourceError>) -> Self {
        lock(&self.scripted).entry(id).or_default().push_back(response);
        self
    }

    /// Answer every unscripted call for `id` with `response`.
    #[must_use]
    pub fn always(self, id: QueryId, response: Result<Vec<RawRecord>, SourceError>) -> Self {
        lock(&self.fallback).insert(id, response);
        self
    }

    /// Sleep for `delay` before answering each call.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = Some(delay);
        self
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Number of calls made for `id`.
    #[must_use]
    pub fn calls_for(&self, id: QueryId) -> usize {
        lock(&self.calls).iter().filter(|call| **call == id).count()
    }

    /// Queries in call order.
    #[must_use]
    pub fn call_log(&self) -> Vec<QueryId> {
        lock(&self.calls).clone()
    }

    fn next_response(&self, id: QueryId) -> Result<Vec<RawRecord>, SourceError> {
        if let Some(response) = lock(&self.scripted).get_mut(&id).and_then(VecDeque::pop_front) {
            return response;
        }
        lock(&self.fallback)
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    async fn fetch(
        &self,
        query: &SourceQuery,
        _bounds: &ViewportBounds,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRecord>, SourceError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        lock(&self.calls).push(query.id);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::select! {
                () = cancel.cancelled() => return Err(SourceError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
        self.next_response(query.id)
    }
}

/// Sleeper that returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSleeper;

#[async_trait]
impl Sleeper for ImmediateSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Sleeper that records requested durations and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Durations requested so far, in order.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.0).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.0).push(duration);
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Start the clock at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward by `delta`, saturating on overflow.
    pub fn advance(&self, delta: Duration) {
        let step = TimeDelta::from_std(delta).unwrap_or(TimeDelta::MAX);
        let mut now = lock(&self.0);
        *now = now.checked_add_signed(step).unwrap_or(*now);
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}
