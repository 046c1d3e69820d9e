//! Outcome aggregation: the recorder seam and an in-memory collector.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::classify::RequestOutcome;

/// Receives every classified outcome from every virtual user.
///
/// Called concurrently from all users; each call must be an independent,
/// atomic append.
pub trait Recorder: Send + Sync {
    fn record(&self, outcome: &RequestOutcome, latency: Duration);
}

/// Recorder that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn record(&self, _outcome: &RequestOutcome, _latency: Duration) {}
}

/// Per-operation counters and latency histogram.
struct OperationStats {
    histogram: Histogram<u64>,
    requests_total: u64,
    requests_success: u64,
    requests_failed: u64,
    failure_reasons: BTreeMap<String, u64>,
}

impl OperationStats {
    fn new() -> Self {
        Self {
            histogram: new_histogram(),
            requests_total: 0,
            requests_success: 0,
            requests_failed: 0,
            failure_reasons: BTreeMap::new(),
        }
    }

    fn record(&mut self, outcome: &RequestOutcome, latency_us: u64) {
        self.requests_total += 1;
        self.histogram.saturating_record(latency_us.max(1));
        if outcome.success {
            self.requests_success += 1;
        } else {
            self.requests_failed += 1;
            let code = outcome.reason_code().unwrap_or("unknown").to_string();
            *self.failure_reasons.entry(code).or_default() += 1;
        }
    }
}

fn new_histogram() -> Histogram<u64> {
    let mut histogram = Histogram::new(3).expect("Failed to create histogram");
    histogram.auto(true);
    histogram
}

struct CollectorState {
    operations: BTreeMap<String, OperationStats>,
    first_request_time: Option<Instant>,
    last_request_time: Option<Instant>,
}

/// Collects metrics during load test execution, keyed by operation name.
pub struct MetricsCollector {
    state: Mutex<CollectorState>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CollectorState {
                operations: BTreeMap::new(),
                first_request_time: None,
                last_request_time: None,
            }),
        }
    }

    /// Discard everything recorded so far.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.operations.clear();
        state.first_request_time = None;
        state.last_request_time = None;
    }

    /// Total requests recorded across all operations.
    pub fn total_requests(&self) -> u64 {
        self.state
            .lock()
            .operations
            .values()
            .map(|op| op.requests_total)
            .sum()
    }

    /// Generate results for everything recorded so far.
    pub fn results(&self, name: impl Into<String>, users: u32) -> TestResults {
        let state = self.state.lock();

        let duration = state
            .last_request_time
            .and_then(|last| state.first_request_time.map(|first| last.duration_since(first)))
            .unwrap_or_default();
        let duration_secs = duration.as_secs_f64();

        let mut combined = new_histogram();
        let mut total = OperationResults::empty("Aggregated");
        let mut operations = Vec::with_capacity(state.operations.len());

        for (op_name, stats) in &state.operations {
            combined.add(&stats.histogram).ok();
            total.requests += stats.requests_total;
            total.successes += stats.requests_success;
            total.failures += stats.requests_failed;
            for (reason, count) in &stats.failure_reasons {
                *total.failure_reasons.entry(reason.clone()).or_default() += count;
            }
            operations.push(OperationResults::from_stats(op_name, stats, duration_secs));
        }
        total.fill_latencies(&combined, duration_secs);

        TestResults {
            timestamp: chrono::Utc::now().to_rfc3339(),
            name: name.into(),
            users,
            duration_secs,
            operations,
            total,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for MetricsCollector {
    fn record(&self, outcome: &RequestOutcome, latency: Duration) {
        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        let now = Instant::now();

        let mut state = self.state.lock();
        state
            .operations
            .entry(outcome.operation.clone())
            .or_insert_with(OperationStats::new)
            .record(outcome, latency_us);
        if state.first_request_time.is_none() {
            state.first_request_time = Some(now);
        }
        state.last_request_time = Some(now);
    }
}

/// Statistics for one operation name (or the aggregate row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResults {
    pub name: String,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub failure_reasons: BTreeMap<String, u64>,
    pub requests_per_second: f64,

    // Latency (ms)
    pub latency_p50: f64,
    pub latency_p75: f64,
    pub latency_p90: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_avg: f64,
}

impl OperationResults {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            requests: 0,
            successes: 0,
            failures: 0,
            failure_reasons: BTreeMap::new(),
            requests_per_second: 0.0,
            latency_p50: 0.0,
            latency_p75: 0.0,
            latency_p90: 0.0,
            latency_p95: 0.0,
            latency_p99: 0.0,
            latency_min: 0.0,
            latency_max: 0.0,
            latency_avg: 0.0,
        }
    }

    fn from_stats(name: &str, stats: &OperationStats, duration_secs: f64) -> Self {
        let mut results = Self::empty(name);
        results.requests = stats.requests_total;
        results.successes = stats.requests_success;
        results.failures = stats.requests_failed;
        results.failure_reasons = stats.failure_reasons.clone();
        results.fill_latencies(&stats.histogram, duration_secs);
        results
    }

    fn fill_latencies(&mut self, histogram: &Histogram<u64>, duration_secs: f64) {
        self.requests_per_second = if duration_secs > 0.0 {
            self.requests as f64 / duration_secs
        } else {
            0.0
        };
        if histogram.len() == 0 {
            return;
        }
        self.latency_p50 = histogram.value_at_percentile(50.0) as f64 / 1000.0;
        self.latency_p75 = histogram.value_at_percentile(75.0) as f64 / 1000.0;
        self.latency_p90 = histogram.value_at_percentile(90.0) as f64 / 1000.0;
        self.latency_p95 = histogram.value_at_percentile(95.0) as f64 / 1000.0;
        self.latency_p99 = histogram.value_at_percentile(99.0) as f64 / 1000.0;
        self.latency_min = histogram.min() as f64 / 1000.0;
        self.latency_max = histogram.max() as f64 / 1000.0;
        self.latency_avg = histogram.mean() / 1000.0;
    }

    /// Failure percentage, 0 when nothing was recorded.
    pub fn failure_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.failures as f64 / self.requests as f64 * 100.0
    }
}

/// Final test results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResults {
    pub timestamp: String,
    pub name: String,
    pub users: u32,
    pub duration_secs: f64,
    pub operations: Vec<OperationResults>,
    pub total: OperationResults,
}

impl TestResults {
    pub fn operation(&self, name: &str) -> Option<&OperationResults> {
        self.operations.iter().find(|op| op.name == name)
    }
}
