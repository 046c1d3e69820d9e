//! Shared fakes for engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use vu_engine::{
    BoxFuture, EngineConfig, HttpRequest, HttpResponse, Recorder, RequestOutcome, Session,
    SharedContext, Transport,
};

/// Transport that answers every request with a fixed response after an
/// optional delay, remembering what it was asked.
pub struct FakeTransport {
    response: HttpResponse,
    delay: Duration,
    pub started: AtomicU64,
    pub completed: AtomicU64,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn with_status(status: u16) -> Arc<Self> {
        Arc::new(Self::new(HttpResponse::ok(status, 0), Duration::ZERO))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::new(
            HttpResponse::transport_error("connection refused"),
            Duration::ZERO,
        ))
    }

    pub fn slow(status: u16, delay: Duration) -> Arc<Self> {
        Arc::new(Self::new(HttpResponse::ok(status, 0), delay))
    }

    fn new(response: HttpResponse, delay: Duration) -> Self {
        Self {
            response,
            delay,
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request(&self, request: HttpRequest) -> HttpResponse {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Recorder that keeps every outcome.
#[derive(Default)]
pub struct VecRecorder {
    pub outcomes: Mutex<Vec<RequestOutcome>>,
}

impl VecRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn operations(&self) -> Vec<String> {
        self.outcomes
            .lock()
            .iter()
            .map(|o| o.operation.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.lock().len()
    }
}

impl Recorder for VecRecorder {
    fn record(&self, outcome: &RequestOutcome, _latency: Duration) {
        self.outcomes.lock().push(outcome.clone());
    }
}

pub fn shared(
    config: EngineConfig,
    transport: Arc<FakeTransport>,
    recorder: Arc<VecRecorder>,
) -> SharedContext {
    SharedContext {
        config: Arc::new(config),
        transport,
        recorder,
    }
}

pub fn config() -> EngineConfig {
    EngineConfig {
        min_wait: 0.0,
        max_wait: 0.0,
        seed: Some(11),
        ..EngineConfig::for_target("http://app.test")
    }
}

pub fn with_data_api(mut config: EngineConfig) -> EngineConfig {
    config.rest_api_url = Some("http://db.test/rest/v1".into());
    config.api_key = Some("anon".into());
    config
}

pub fn home(session: &mut Session) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        session.get("/", "GET /").await;
    })
}

pub fn listing(session: &mut Session) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let window = session.page_window();
        session
            .data_get("/orders?select=id", "SB GET orders", Some(window))
            .await;
    })
}
