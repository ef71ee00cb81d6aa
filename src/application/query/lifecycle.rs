//! Query - one dataset query kept current under change events.
//!
//! # Operations
//!
//! A query runs at most one operation at a time:
//!
//! - **fetch**: POST the spec, store the new data, then run the pipeline
//! - **recompute**: run the pipeline over the stored data
//!
//! A trigger that arrives while an operation is in flight only sets the
//! `requery` or `reprepare` flag. When the operation settles, the same task
//! runs at most one follow-up (fetch wins over recompute) without releasing
//! the in-flight marker.
//!
//! # Deactivation
//!
//! `deactivate` never blocks. It drops the callbacks and records the idle
//! callback, which fires exactly once: when the in-flight operation settles,
//! when a data event makes the cached data stale, or immediately if there is
//! nothing cached and nothing running. Firing it also closes the query's
//! object subscriptions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::application::AnalysisPipeline;
use crate::domain::analysis::QueryOutput;
use crate::domain::foundation::{
    DomainError, Event, EventFilter, QueryId, StateMachine, SubscriptionKey,
};
use crate::domain::query::{QueryContext, QuerySpec, QueryState};
use crate::ports::{ApiClient, EventHandler, EventSubscriber, HttpMethod};

/// Receives `(qdata, output)` whenever new output is ready.
pub type OutputCallback = Arc<dyn Fn(&QueryContext, &QueryOutput) + Send + Sync>;
/// Receives human-readable progress and failure messages.
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Called once a deactivated query no longer holds useful data.
pub type IdleCallback = Box<dyn FnOnce() + Send>;

pub const STATUS_QUERYING: &str = "Querying Data...";
pub const STATUS_PROCESSING: &str = "Processing Data...";

/// Endpoint and event names a query reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub dataset_path: String,
    /// Events meaning a series' data changed; these trigger a fetch.
    pub data_events: Vec<String>,
    /// Events meaning only a series' metadata changed; these trigger a recompute.
    pub object_events: Vec<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            dataset_path: "api/timeseries/dataset".to_string(),
            data_events: vec![
                "timeseries_data_write".to_string(),
                "timeseries_actions_write".to_string(),
                "timeseries_data_delete".to_string(),
            ],
            object_events: vec!["object_update".to_string()],
        }
    }
}

/// Collaborators shared by every query.
pub struct QueryServices {
    pub api: Arc<dyn ApiClient>,
    pub pipeline: Arc<AnalysisPipeline>,
    pub events: Arc<dyn EventSubscriber>,
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Fetch,
    Recompute,
}

/// How an operation ended without error.
enum Outcome {
    Completed,
    /// Stopped early because the query was deactivated or closed.
    Abandoned,
}

/// Operation failure, kept apart so each gets its own status prefix.
enum Failure {
    Fetch(DomainError),
    Processing(DomainError),
}

impl Failure {
    fn status(&self) -> String {
        match self {
            Failure::Fetch(e) => format!("Query Failed: {}", e.message),
            Failure::Processing(e) => format!("Processing Failed: {}", e.message),
        }
    }
}

struct QueryCore {
    state: QueryState,
    qdata: Option<Arc<QueryContext>>,
    output: Option<Arc<QueryOutput>>,
    in_flight: bool,
    requery: bool,
    reprepare: bool,
    on_output: Option<OutputCallback>,
    on_status: Option<StatusCallback>,
    deactivating: bool,
    on_idle: Option<IdleCallback>,
    closed: bool,
    outdated: bool,
}

impl QueryCore {
    fn set_state(&mut self, target: QueryState) {
        if self.state == target {
            return;
        }
        match self.state.transition_to(target) {
            Ok(next) => self.state = next,
            Err(e) => tracing::warn!(error = %e, "Unexpected query state change"),
        }
    }
}

struct QueryInner {
    id: QueryId,
    spec: QuerySpec,
    objects: BTreeSet<String>,
    services: Arc<QueryServices>,
    core: Mutex<QueryCore>,
}

/// Handle to a live query. Clones share the same state.
#[derive(Clone)]
pub struct Query {
    inner: Arc<QueryInner>,
}

impl Query {
    /// Creates the query, subscribes to its series and activates it.
    pub fn new(
        spec: QuerySpec,
        services: Arc<QueryServices>,
        on_output: OutputCallback,
        on_status: StatusCallback,
    ) -> Self {
        let objects = spec.objects();
        let query = Self {
            inner: Arc::new(QueryInner {
                id: QueryId::new(),
                spec,
                objects,
                services,
                core: Mutex::new(QueryCore {
                    state: QueryState::Idle,
                    qdata: None,
                    output: None,
                    in_flight: false,
                    requery: false,
                    reprepare: false,
                    on_output: None,
                    on_status: None,
                    deactivating: false,
                    on_idle: None,
                    closed: false,
                    outdated: false,
                }),
            }),
        };
        tracing::debug!(
            query_id = %query.inner.id,
            objects = ?query.inner.objects,
            "Query created"
        );
        query.subscribe_objects();
        query.activate(on_output, on_status);
        query
    }

    pub fn id(&self) -> &QueryId {
        &self.inner.id
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.inner.spec
    }

    /// Every series id the spec references.
    pub fn objects(&self) -> &BTreeSet<String> {
        &self.inner.objects
    }

    pub fn state(&self) -> QueryState {
        self.lock().state
    }

    pub fn qdata(&self) -> Option<Arc<QueryContext>> {
        self.lock().qdata.clone()
    }

    pub fn output(&self) -> Option<Arc<QueryOutput>> {
        self.lock().output.clone()
    }

    /// Activated and not waiting to go idle.
    pub fn is_active(&self) -> bool {
        let core = self.lock();
        !core.deactivating && !core.closed
    }

    /// Deactivated but still holding data that may be reused.
    pub fn is_deactivating(&self) -> bool {
        let core = self.lock();
        core.deactivating && !core.closed
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// True when change events may have been missed since the last fetch.
    pub fn is_outdated(&self) -> bool {
        self.lock().outdated
    }

    pub fn mark_outdated(&self) {
        self.lock().outdated = true;
    }

    /// Whether this query was built from a spec equal to `spec`.
    pub fn is_equal(&self, spec: &QuerySpec) -> bool {
        self.inner.spec == *spec
    }

    /// Attaches callbacks and brings the output up to date.
    ///
    /// - no data and nothing running: fetch
    /// - data but no output: recompute
    /// - both: replay them to `on_output` immediately
    ///
    /// A closed query drops its cached data first and fetches again.
    pub fn activate(&self, on_output: OutputCallback, on_status: StatusCallback) {
        enum Next {
            Nothing,
            Start(Operation),
            Replay(Arc<QueryContext>, Arc<QueryOutput>),
        }

        let connected = self.inner.services.events.is_connected();
        let (reopened, next) = {
            let mut core = self.lock();
            core.on_output = Some(Arc::clone(&on_output));
            core.on_status = Some(on_status);
            core.deactivating = false;
            core.on_idle = None;
            core.outdated = !connected;
            let reopened = std::mem::replace(&mut core.closed, false);
            if reopened {
                // Closed queries may have missed events; their cache is stale.
                core.qdata = None;
                core.output = None;
                if core.in_flight {
                    core.requery = true;
                } else {
                    core.set_state(QueryState::Idle);
                }
            }

            let next = match (&core.qdata, &core.output) {
                (None, _) if core.in_flight => Next::Nothing,
                (None, _) => Next::Start(Operation::Fetch),
                (Some(_), None) => Next::Start(Operation::Recompute),
                (Some(qdata), Some(output)) => Next::Replay(Arc::clone(qdata), Arc::clone(output)),
            };
            (reopened, next)
        };

        tracing::debug!(query_id = %self.inner.id, "Query activated");
        if reopened {
            self.subscribe_objects();
        }
        match next {
            Next::Nothing => {}
            Next::Start(op) => self.trigger(op),
            Next::Replay(qdata, output) => on_output(&qdata, &output),
        }
    }

    /// Drops the callbacks and arranges for `on_idle` to run once.
    pub fn deactivate(&self, on_idle: IdleCallback) {
        let idle_now = {
            let mut core = self.lock();
            core.on_output = None;
            core.on_status = None;
            core.requery = false;
            core.reprepare = false;
            core.deactivating = true;
            core.on_idle = Some(on_idle);
            !core.in_flight && core.qdata.is_none()
        };
        tracing::debug!(query_id = %self.inner.id, idle_now, "Query deactivated");
        if idle_now {
            self.go_idle();
        }
    }

    /// A series' data may have changed.
    pub fn on_data_event(&self, event: &Event) {
        let Some(object) = event.object.as_deref() else {
            return;
        };
        if !self.inner.objects.contains(object) {
            return;
        }
        if self.go_idle() {
            tracing::debug!(query_id = %self.inner.id, %object, "Cached output is stale, releasing query");
            return;
        }
        tracing::debug!(query_id = %self.inner.id, %object, "Data changed, re-querying");
        self.trigger(Operation::Fetch);
    }

    /// A series' metadata changed; the data itself is still valid.
    pub fn on_object_event(&self, event: &Event) {
        {
            let mut core = self.lock();
            if core.closed {
                return;
            }
            if core.deactivating {
                core.output = None;
                return;
            }
        }
        tracing::debug!(query_id = %self.inner.id, object = ?event.object, "Metadata changed, reprocessing");
        self.trigger(Operation::Recompute);
    }

    /// Re-runs the fetch, e.g. after the event channel reconnects.
    pub fn refresh(&self) {
        self.trigger(Operation::Fetch);
    }

    /// Fires a pending idle callback now. Returns `false` if the query was
    /// not deactivated.
    pub fn expire(&self) -> bool {
        self.go_idle()
    }

    /// Unsubscribes from all series and drops any pending follow-up.
    pub fn close(&self) {
        {
            let mut core = self.lock();
            core.closed = true;
            core.requery = false;
            core.reprepare = false;
        }
        self.unsubscribe_objects();
        tracing::debug!(query_id = %self.inner.id, "Query closed");
    }

    // === Operations ===

    fn trigger(&self, op: Operation) {
        {
            let mut core = self.lock();
            if core.closed {
                return;
            }
            if core.in_flight {
                match op {
                    Operation::Fetch => core.requery = true,
                    Operation::Recompute => core.reprepare = true,
                }
                tracing::debug!(query_id = %self.inner.id, ?op, "Operation in flight, deferring");
                return;
            }
            core.in_flight = true;
        }
        let query = self.clone();
        tokio::spawn(async move { query.drive(op).await });
    }

    /// Runs `op` and any follow-ups while holding the in-flight marker.
    async fn drive(self, mut op: Operation) {
        loop {
            let result = match op {
                Operation::Fetch => self.fetch().await,
                Operation::Recompute => self.recompute().await,
            };
            match self.settle(result) {
                Some(next) => {
                    op = next;
                    tokio::task::yield_now().await;
                }
                None => return,
            }
        }
    }

    async fn fetch(&self) -> Result<Outcome, Failure> {
        {
            let mut core = self.lock();
            core.requery = false;
            core.set_state(QueryState::Fetching);
        }
        self.status(STATUS_QUERYING);
        tracing::debug!(query_id = %self.inner.id, "Fetching dataset");

        let services = &self.inner.services;
        let response = services
            .api
            .request(
                HttpMethod::Post,
                &services.options.dataset_path,
                Some(self.inner.spec.to_value()),
            )
            .await
            .map_err(Failure::Fetch)?;
        if !response.ok {
            return Err(Failure::Fetch(
                DomainError::fetch(response.failure_reason())
                    .with_detail("status", response.status.to_string()),
            ));
        }
        let qdata = Arc::new(QueryContext::from_response(response.data).map_err(Failure::Fetch)?);

        let connected = services.events.is_connected();
        {
            let mut core = self.lock();
            if core.closed {
                return Ok(Outcome::Abandoned);
            }
            if connected {
                core.outdated = false;
            }
            core.qdata = Some(Arc::clone(&qdata));
            core.output = None;
        }
        if self.go_idle() {
            return Ok(Outcome::Abandoned);
        }
        self.process(qdata).await
    }

    async fn recompute(&self) -> Result<Outcome, Failure> {
        let qdata = {
            let mut core = self.lock();
            match core.qdata.clone() {
                Some(qdata) => {
                    core.set_state(QueryState::Recomputing);
                    qdata
                }
                None => return Ok(Outcome::Completed),
            }
        };
        self.process(qdata).await
    }

    async fn process(&self, qdata: Arc<QueryContext>) -> Result<Outcome, Failure> {
        self.lock().reprepare = false;
        self.status(STATUS_PROCESSING);

        let pipeline = &self.inner.services.pipeline;
        let results = pipeline.analyze(&qdata).await.map_err(Failure::Processing)?;
        if self.go_idle() {
            return Ok(Outcome::Abandoned);
        }
        let output = Arc::new(pipeline.preprocess(&qdata, results).map_err(Failure::Processing)?);

        let on_output = {
            let mut core = self.lock();
            if core.closed {
                return Ok(Outcome::Abandoned);
            }
            core.output = Some(Arc::clone(&output));
            core.set_state(QueryState::Ready);
            core.on_output.clone()
        };
        if let Some(on_output) = on_output {
            on_output(&qdata, &output);
        }
        Ok(Outcome::Completed)
    }

    /// Records the result of an operation and picks the follow-up, if any.
    ///
    /// Releases the in-flight marker only when there is no follow-up.
    fn settle(&self, result: Result<Outcome, Failure>) -> Option<Operation> {
        let failure = match result {
            Ok(Outcome::Completed) | Ok(Outcome::Abandoned) => None,
            Err(failure) => Some(failure),
        };

        let mut idle = false;
        let mut report: Option<(StatusCallback, String)> = None;
        let next = {
            let mut core = self.lock();
            if core.state.is_busy() {
                let fallback = if core.output.is_some() {
                    QueryState::Ready
                } else {
                    QueryState::Idle
                };
                core.set_state(fallback);
            }
            if let Some(failure) = &failure {
                if !core.deactivating {
                    if let Some(on_status) = core.on_status.clone() {
                        report = Some((on_status, failure.status()));
                    }
                }
            }

            if core.closed || core.deactivating {
                idle = core.deactivating && !core.closed;
                core.in_flight = false;
                None
            } else if core.requery {
                core.requery = false;
                Some(Operation::Fetch)
            } else if core.reprepare {
                core.reprepare = false;
                Some(Operation::Recompute)
            } else {
                core.in_flight = false;
                None
            }
        };

        match &failure {
            Some(Failure::Fetch(e)) => {
                tracing::error!(query_id = %self.inner.id, error = %e, "Query failed")
            }
            Some(Failure::Processing(e)) => {
                tracing::error!(query_id = %self.inner.id, error = %e, "Processing failed")
            }
            None => {}
        }
        if let Some((on_status, message)) = report {
            on_status(&message);
        }
        if idle {
            self.go_idle();
        }
        next
    }

    // === Deactivation and subscriptions ===

    /// Honors a pending deactivation: closes the query and fires the idle
    /// callback. Returns `true` if a deactivation was pending.
    fn go_idle(&self) -> bool {
        let on_idle = {
            let mut core = self.lock();
            if !core.deactivating {
                return false;
            }
            if core.closed {
                return true;
            }
            core.closed = true;
            core.requery = false;
            core.reprepare = false;
            core.on_idle.take()
        };
        self.unsubscribe_objects();
        tracing::debug!(query_id = %self.inner.id, "Query idle");
        if let Some(on_idle) = on_idle {
            on_idle();
        }
        true
    }

    fn status(&self, message: &str) {
        let on_status = {
            let core = self.lock();
            if core.deactivating {
                None
            } else {
                core.on_status.clone()
            }
        };
        if let Some(on_status) = on_status {
            on_status(message);
        }
    }

    fn subscription_keys(&self) -> impl Iterator<Item = (SubscriptionKey, &String)> + '_ {
        self.inner
            .objects
            .iter()
            .map(move |object| (SubscriptionKey::for_query_object(&self.inner.id, object), object))
    }

    fn subscribe_objects(&self) {
        let events = &self.inner.services.events;
        for (key, object) in self.subscription_keys() {
            let handler = Arc::new(QueryEventHandler {
                query: Arc::downgrade(&self.inner),
                options: self.inner.services.options.clone(),
            });
            events.subscribe(key, EventFilter::any().object(object.as_str()), handler);
        }
    }

    fn unsubscribe_objects(&self) {
        let events = &self.inner.services.events;
        for (key, _) in self.subscription_keys() {
            events.unsubscribe(&key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueryCore> {
        self.inner.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.inner.id)
            .field("objects", &self.inner.objects)
            .field("state", &self.state())
            .finish()
    }
}

/// Routes a series' events to its query without keeping the query alive.
struct QueryEventHandler {
    query: Weak<QueryInner>,
    options: QueryOptions,
}

impl EventHandler for QueryEventHandler {
    fn handle(&self, event: &Event) {
        let Some(inner) = self.query.upgrade() else {
            return;
        };
        let query = Query { inner };
        if self.options.data_events.iter().any(|e| *e == event.event) {
            query.on_data_event(event);
        } else if self.options.object_events.iter().any(|e| *e == event.event) {
            query.on_object_event(event);
        }
    }

    fn name(&self) -> &str {
        "QueryEventHandler"
    }
}
