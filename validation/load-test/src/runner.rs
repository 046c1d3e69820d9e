//! Load test orchestration: wires the traffic mix into a population run.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use vu_engine::{
    ActiveUsers, MetricsCollector, Population, PopulationReport, ReqwestTransport, TestResults,
    Transport,
};

use crate::config::TestConfig;
use crate::scenario;

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub results: TestResults,
    pub population: PopulationReport,
}

/// Executes a load test described by a [`TestConfig`].
pub struct LoadRunner {
    config: TestConfig,
    show_progress: bool,
    transport: Option<Arc<dyn Transport>>,
}

impl LoadRunner {
    /// Create a new load runner.
    pub fn new(config: TestConfig) -> Self {
        Self {
            config,
            show_progress: true,
            transport: None,
        }
    }

    /// Send requests through `transport` instead of a pooled HTTP client.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run the load test until its duration elapses, every user reaches its
    /// iteration limit, or `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<RunSummary> {
        self.config.validate()?;
        let engine = &self.config.engine;

        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(ReqwestTransport::new(
                engine.request_timeout(),
                engine.users as usize,
            )?),
        };
        let collector = Arc::new(MetricsCollector::new());
        let catalog = scenario::read_only_mix(&self.config.scenario)?;
        let population = Population::new(engine.clone(), catalog, transport, collector.clone())?;

        info!(
            name = %self.config.name,
            users = engine.users,
            spawn_rate = engine.spawn_rate,
            duration_secs = ?engine.duration_secs,
            iterations_per_user = ?engine.iterations_per_user,
            data_api = !engine.is_degraded(),
            "Starting load test"
        );

        let pb = self.progress_bar();
        let ticker = spawn_ticker(
            pb.clone(),
            population.active_users(),
            collector.clone(),
            self.config.warmup_secs,
            cancel.clone(),
        );

        let report = population.run(cancel).await;

        ticker.abort();
        pb.finish_with_message("Complete!");

        let results = collector.results(self.config.name.clone(), report.users_spawned);
        info!(
            requests = results.total.requests,
            failures = results.total.failures,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "Load test finished"
        );

        Ok(RunSummary {
            results,
            population: report,
        })
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        match self.config.engine.duration_secs {
            Some(secs) => {
                let pb = ProgressBar::new(secs);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}s {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("##-"),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("[{elapsed_precise}] {spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        }
    }
}

/// Once a second: advance the bar, show live counts, and drop the warmup
/// traffic from the collector when the warmup ends.
fn spawn_ticker(
    pb: ProgressBar,
    active: ActiveUsers,
    collector: Arc<MetricsCollector>,
    warmup_secs: u64,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        let mut elapsed = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    pb.set_message("Stopping, waiting for in-flight requests...");
                    return;
                }
                _ = interval.tick() => {}
            }

            if warmup_secs > 0 && elapsed == warmup_secs {
                collector.reset();
                info!(warmup_secs, "Warmup complete, metrics reset");
            }

            let phase = if elapsed < warmup_secs { "Warmup" } else { "Test phase" };
            pb.set_position(elapsed);
            pb.set_message(format!(
                "{phase} | users: {} | requests: {}",
                active.get(),
                collector.total_requests()
            ));
            pb.tick();
            elapsed += 1;
        }
    })
}
