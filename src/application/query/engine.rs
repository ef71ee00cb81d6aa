//! QueryEngine - public surface over queries, subscriptions and the pipeline.
//!
//! Keeps every outstanding query in a cache. A released query stays cached
//! until its idle callback fires, so a caller asking for an equal spec in the
//! meantime gets the cached data back without a fetch.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;

use super::{OutputCallback, Query, QueryServices, StatusCallback};
use crate::domain::analysis::{Analyzer, FieldAccessor, Preprocessor, StatValue};
use crate::domain::foundation::{DomainError, EventFilter, QueryId, SubscriptionKey, Timestamp};
use crate::domain::query::{QuerySpec, Series};
use crate::ports::EventHandler;

type QueryCache = Mutex<Vec<Query>>;

pub struct QueryEngine {
    services: Arc<QueryServices>,
    connectivity: watch::Receiver<Option<Timestamp>>,
    queries: Arc<QueryCache>,
}

impl QueryEngine {
    /// `connectivity` publishes the event channel's open time, `None`
    /// while it is down.
    pub fn new(services: Arc<QueryServices>, connectivity: watch::Receiver<Option<Timestamp>>) -> Self {
        Self {
            services,
            connectivity,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn services(&self) -> &Arc<QueryServices> {
        &self.services
    }

    /// Returns an active query for `spec`.
    ///
    /// A released query with an equal spec is reactivated instead of
    /// creating a new one.
    pub fn query(&self, spec: QuerySpec, on_output: OutputCallback, on_status: StatusCallback) -> Query {
        let cached = lock(&self.queries)
            .iter()
            .find(|q| q.is_deactivating() && q.is_equal(&spec))
            .cloned();
        if let Some(query) = cached {
            tracing::debug!(query_id = %query.id(), "Reusing cached query");
            query.activate(on_output, on_status);
            return query;
        }

        let query = Query::new(spec, Arc::clone(&self.services), on_output, on_status);
        lock(&self.queries).push(query.clone());
        query
    }

    /// Like [`QueryEngine::query`], validating a JSON spec first.
    pub fn query_value(
        &self,
        spec: serde_json::Value,
        on_output: OutputCallback,
        on_status: StatusCallback,
    ) -> Result<Query, DomainError> {
        let spec = QuerySpec::from_value(spec)?;
        Ok(self.query(spec, on_output, on_status))
    }

    /// Deactivates `query`; it leaves the cache once its idle callback fires.
    pub fn release(&self, query: &Query) {
        let cache = Arc::downgrade(&self.queries);
        let id = *query.id();
        query.deactivate(Box::new(move || evict(&cache, &id)));
    }

    pub fn len(&self) -> usize {
        lock(&self.queries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.queries).is_empty()
    }

    /// Snapshot of the cached queries.
    pub fn queries(&self) -> Vec<Query> {
        lock(&self.queries).clone()
    }

    // === Delegation ===

    pub fn subscribe(&self, key: SubscriptionKey, filter: EventFilter, handler: Arc<dyn EventHandler>) {
        self.services.events.subscribe(key, filter, handler);
    }

    pub fn unsubscribe(&self, key: &SubscriptionKey) {
        self.services.events.unsubscribe(key);
    }

    pub fn register_analyzer(&self, analyzer: Arc<dyn Analyzer>) {
        self.services.pipeline.register_analyzer(analyzer);
    }

    pub fn register_preprocessor(&self, visualization: impl Into<String>, preprocessor: Arc<dyn Preprocessor>) {
        self.services.pipeline.register_preprocessor(visualization, preprocessor);
    }

    pub fn set_query_prop<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&FieldAccessor, &Series) -> StatValue + Send + Sync + 'static,
    {
        self.services.pipeline.set_query_prop(name, f);
    }

    // === Connectivity ===

    /// Watch connectivity until shutdown signal is received.
    ///
    /// On disconnect every query is marked outdated. On reconnect, active
    /// outdated queries re-fetch and released outdated queries are evicted.
    pub async fn run_connectivity_monitor(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        let mut connectivity = self.connectivity.clone();
        let mut connected = connectivity.borrow_and_update().is_some();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    let since = *connectivity.borrow_and_update();
                    match since {
                        None => self.mark_all_outdated(),
                        Some(since) if !connected => {
                            tracing::info!(%since, "Event channel reconnected");
                            self.refresh_outdated();
                        }
                        Some(_) => {}
                    }
                    connected = since.is_some();
                }
            }
        }
    }

    /// Marks every cached query outdated; events may be missed while down.
    pub fn mark_all_outdated(&self) {
        for query in self.queries() {
            query.mark_outdated();
        }
    }

    /// Re-fetches active outdated queries and evicts released ones.
    ///
    /// Returns `(refreshed, evicted)`.
    pub fn refresh_outdated(&self) -> (usize, usize) {
        let mut refreshed = 0;
        let mut evicted = 0;
        for query in self.queries() {
            if !query.is_outdated() {
                continue;
            }
            if query.is_active() {
                query.refresh();
                refreshed += 1;
            } else if query.expire() {
                evicted += 1;
            }
        }
        tracing::info!(refreshed, evicted, "Refreshed outdated queries after reconnect");
        (refreshed, evicted)
    }
}

fn lock(cache: &QueryCache) -> MutexGuard<'_, Vec<Query>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

fn evict(cache: &Weak<QueryCache>, id: &QueryId) {
    if let Some(cache) = cache.upgrade() {
        lock(&cache).retain(|q| q.id() != id);
        tracing::debug!(query_id = %id, "Evicted query");
    }
}
