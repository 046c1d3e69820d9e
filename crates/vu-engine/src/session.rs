//! Per-user request context handed to behavior actions.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::header::{HeaderMap, HeaderValue, RANGE};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::classify::{classify_response, RequestOutcome};
use crate::config::{join_url, EngineConfig};
use crate::metrics::Recorder;
use crate::transport::{HttpRequest, Transport};
use crate::window::PageWindow;

/// Collaborators shared by every user of a run.
#[derive(Clone)]
pub struct SharedContext {
    pub config: Arc<EngineConfig>,
    pub transport: Arc<dyn Transport>,
    pub recorder: Arc<dyn Recorder>,
}

/// Data API endpoint and headers derived during setup.
struct DataApiSession {
    base_url: String,
    headers: HeaderMap,
}

/// State owned by exactly one virtual user.
pub struct Session {
    index: u32,
    identity: Uuid,
    rng: StdRng,
    base_url: String,
    data_api: Option<DataApiSession>,
    shared: SharedContext,
    requests: u64,
    failures: u64,
}

impl Session {
    /// Create the session for user `index`. With a configured seed the
    /// RNG is seeded from `seed + index`, otherwise from entropy.
    pub fn new(index: u32, shared: SharedContext) -> Self {
        let rng = match shared.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(index))),
            None => StdRng::from_entropy(),
        };
        let base_url = shared
            .config
            .target_base_url()
            .map(str::to_string)
            .unwrap_or_default();

        Self {
            index,
            identity: Uuid::new_v4(),
            rng,
            base_url,
            data_api: None,
            shared,
            requests: 0,
            failures: 0,
        }
    }

    /// One-time setup on entering `Running`: derive data API headers.
    ///
    /// Missing or unusable credentials leave the session in degraded mode,
    /// where [`Session::data_get`] silently skips.
    pub fn setup(&mut self) {
        let Some(api) = self.shared.config.data_api() else {
            debug!(user = self.index, "Data API not configured; dependent behaviors will skip");
            return;
        };
        match api.headers() {
            Ok(headers) => {
                self.data_api = Some(DataApiSession {
                    base_url: api.base_url,
                    headers,
                });
            }
            Err(e) => {
                warn!(user = self.index, error = %e, "Could not derive data API headers");
            }
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn identity(&self) -> Uuid {
        self.identity
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn has_data_api(&self) -> bool {
        self.data_api.is_some()
    }

    /// Requests issued so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Requests classified as failures so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// A random page window shaped by the configured page size and count.
    pub fn page_window(&mut self) -> PageWindow {
        let (page_size, max_page) = (self.shared.config.page_size, self.shared.config.max_page);
        PageWindow::random(&mut self.rng, page_size, max_page)
    }

    /// GET `path` on the target host, recorded under `name`.
    pub async fn get(&mut self, path: &str, name: &str) -> RequestOutcome {
        let url = join_url(&self.base_url, path);
        self.send(HttpRequest::get(url, name)).await
    }

    /// GET `path` on the data API, recorded under `name`, optionally
    /// restricted to a page window. Returns `None` without issuing anything
    /// when the data API is not configured.
    pub async fn data_get(
        &mut self,
        path: &str,
        name: &str,
        window: Option<PageWindow>,
    ) -> Option<RequestOutcome> {
        let api = self.data_api.as_ref()?;

        let mut headers = api.headers.clone();
        if let Some(window) = window {
            if let Ok(value) = HeaderValue::from_str(&window.range_header()) {
                headers.insert(RANGE, value);
            }
        }
        let request = HttpRequest::get(join_url(&api.base_url, path), name).with_headers(headers);

        Some(self.send(request).await)
    }

    /// Issue a request, classify it and record the outcome.
    pub async fn send(&mut self, request: HttpRequest) -> RequestOutcome {
        let name = request.name.clone();
        let start = Instant::now();
        let response = self.shared.transport.request(request).await;
        let latency = start.elapsed();

        let outcome = classify_response(
            &name,
            &response,
            self.shared.config.unauthorized_is_failure,
        );
        self.shared.recorder.record(&outcome, latency);

        self.requests += 1;
        if !outcome.success {
            self.failures += 1;
            debug!(
                user = self.index,
                operation = %name,
                status = response.status,
                reason = outcome.reason_code().unwrap_or_default(),
                error = response.error.as_deref().unwrap_or_default(),
                "Request failed"
            );
        }

        outcome
    }
}
