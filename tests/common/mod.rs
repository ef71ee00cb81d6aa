//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use timeseries_query::adapters::EventRouter;
use timeseries_query::application::{
    AnalysisPipeline, OutputCallback, QueryOptions, QueryServices, StatusCallback,
};
use timeseries_query::domain::analysis::QueryOutput;
use timeseries_query::domain::foundation::{DomainError, Event};
use timeseries_query::domain::query::{QueryContext, QuerySpec};
use timeseries_query::ports::{ApiClient, ApiResponse, HttpMethod};

pub const SERIES_ID: &str = "temp-id";

/// Dataset API whose responses wait for permits released by the test.
pub struct GatedApi {
    gate: Semaphore,
    calls: AtomicUsize,
    responses: Mutex<VecDeque<Result<ApiResponse, DomainError>>>,
    bodies: Mutex<Vec<(String, JsonValue)>>,
}

impl GatedApi {
    /// Every request blocks until [`GatedApi::release`] is called.
    pub fn closed() -> Arc<Self> {
        Arc::new(Self::with_permits(0))
    }

    /// Requests complete immediately.
    pub fn open() -> Arc<Self> {
        Arc::new(Self::with_permits(Semaphore::MAX_PERMITS))
    }

    fn with_permits(permits: usize) -> Self {
        Self {
            gate: Semaphore::new(permits),
            calls: AtomicUsize::new(0),
            responses: Mutex::new(VecDeque::new()),
            bodies: Mutex::new(Vec::new()),
        }
    }

    pub fn release(&self, requests: usize) {
        self.gate.add_permits(requests);
    }

    /// Queues the result for the next request; later requests get the
    /// default dataset.
    pub fn respond_with(&self, result: Result<ApiResponse, DomainError>) {
        self.responses.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<(String, JsonValue)> {
        self.bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiClient for GatedApi {
    async fn request(
        &self,
        _method: HttpMethod,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<ApiResponse, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .unwrap()
            .push((path.to_string(), body.unwrap_or(JsonValue::Null)));
        self.gate.acquire().await.unwrap().forget();
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::success(dataset())))
    }
}

pub fn dataset() -> JsonValue {
    json!({"temp": [{"t": 1.0, "d": 2}, {"t": 2.0, "d": 4}]})
}

pub fn spec() -> QuerySpec {
    QuerySpec::from_value(json!({"temp": {"timeseries": SERIES_ID, "t1": "now-1d"}})).unwrap()
}

pub fn services(api: Arc<GatedApi>, router: Arc<EventRouter>) -> Arc<QueryServices> {
    Arc::new(QueryServices {
        api,
        pipeline: Arc::new(AnalysisPipeline::with_defaults(6, 50_000)),
        events: router,
        options: QueryOptions::default(),
    })
}

/// Captures everything a query reports.
#[derive(Clone, Default)]
pub struct Recorder {
    outputs: Arc<Mutex<Vec<QueryOutput>>>,
    statuses: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn on_output(&self) -> OutputCallback {
        let outputs = Arc::clone(&self.outputs);
        Arc::new(move |_qdata: &QueryContext, output: &QueryOutput| {
            outputs.lock().unwrap().push(output.clone());
        })
    }

    pub fn on_status(&self) -> StatusCallback {
        let statuses = Arc::clone(&self.statuses);
        Arc::new(move |status: &str| statuses.lock().unwrap().push(status.to_string()))
    }

    pub fn outputs(&self) -> Vec<QueryOutput> {
        self.outputs.lock().unwrap().clone()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.lock().unwrap().len()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }
}

/// Counts idle callbacks.
#[derive(Clone, Default)]
pub struct IdleCounter(Arc<AtomicUsize>);

impl IdleCounter {
    pub fn callback(&self) -> Box<dyn FnOnce() + Send> {
        let count = Arc::clone(&self.0);
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn data_event(object: &str) -> Event {
    Event::new("timeseries_data_write").with_object(object)
}

pub fn object_event(object: &str) -> Event {
    Event::new("object_update").with_object(object)
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Lets spawned tasks run without waiting on any condition.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
