//! Population manager: ramps virtual users up, runs them, stops them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::BehaviorCatalog;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::metrics::Recorder;
use crate::pacing::Pacing;
use crate::session::SharedContext;
use crate::transport::Transport;
use crate::user::{UserReport, VirtualUser};

/// Number of users currently in `Running`.
#[derive(Clone, Default)]
pub struct ActiveUsers(Arc<AtomicU32>);

impl ActiveUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one user as running until the returned guard drops, even if
    /// the user task panics.
    fn enter(&self) -> ActiveGuard {
        self.0.fetch_add(1, Ordering::Relaxed);
        ActiveGuard(self.0.clone())
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

struct ActiveGuard(Arc<AtomicU32>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationReport {
    pub users_spawned: u32,
    pub total_iterations: u64,
    pub total_requests: u64,
    pub total_failures: u64,
    pub elapsed: Duration,
    pub users: Vec<UserReport>,
}

impl PopulationReport {
    /// Mean lifetime of a user.
    pub fn avg_user_time(&self) -> Duration {
        if self.users.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.users.iter().map(|u| u.elapsed).sum();
        total / self.users.len() as u32
    }
}

/// Spawns and supervises the virtual users of one run.
pub struct Population {
    config: Arc<EngineConfig>,
    catalog: Arc<BehaviorCatalog>,
    pacing: Pacing,
    spawn_interval: Duration,
    transport: Arc<dyn Transport>,
    recorder: Arc<dyn Recorder>,
    active: ActiveUsers,
}

impl Population {
    /// Validate everything that could make the run meaningless before any
    /// user starts: configuration, catalog and pacing range.
    pub fn new(
        config: EngineConfig,
        catalog: BehaviorCatalog,
        transport: Arc<dyn Transport>,
        recorder: Arc<dyn Recorder>,
    ) -> EngineResult<Self> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(EngineError::NoBehaviorsRegistered);
        }
        let pacing = config.pacing()?;
        let spawn_interval = config.spawn_interval()?;

        if config.is_degraded() {
            warn!("REST data API not configured; behaviors that depend on it will skip");
        }

        Ok(Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            pacing,
            spawn_interval,
            transport,
            recorder,
            active: ActiveUsers::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &BehaviorCatalog {
        &self.catalog
    }

    /// Live count of running users.
    pub fn active_users(&self) -> ActiveUsers {
        self.active.clone()
    }

    /// Run the population until the configured duration elapses, `cancel`
    /// fires, or every user has hit its iteration limit.
    ///
    /// Returns once all users are `Stopped`.
    pub async fn run(&self, cancel: CancellationToken) -> PopulationReport {
        let started = Instant::now();
        let stop = cancel.child_token();

        if let Some(secs) = self.config.duration_secs {
            let timer = stop.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => timer.cancel(),
                    _ = timer.cancelled() => {}
                }
            });
        }

        info!(
            users = self.config.users,
            spawn_rate = self.config.spawn_rate,
            "Ramping up virtual users"
        );

        let mut users = JoinSet::new();
        let mut spawned = 0u32;

        for index in 0..self.config.users {
            if stop.is_cancelled() {
                break;
            }
            self.spawn_user(&mut users, index, stop.clone());
            spawned += 1;

            if index + 1 < self.config.users {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(self.spawn_interval) => {}
                }
            }
        }
        info!(spawned, "All users spawned");

        let mut reports = Vec::with_capacity(spawned as usize);
        while let Some(joined) = users.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "User task ended abnormally"),
            }
        }
        // Release the duration timer if users finished on their own
        stop.cancel();

        reports.sort_by_key(|r| r.index);
        PopulationReport {
            users_spawned: spawned,
            total_iterations: reports.iter().map(|r| r.iterations).sum(),
            total_requests: reports.iter().map(|r| r.requests).sum(),
            total_failures: reports.iter().map(|r| r.failures).sum(),
            elapsed: started.elapsed(),
            users: reports,
        }
    }

    fn spawn_user(&self, users: &mut JoinSet<UserReport>, index: u32, stop: CancellationToken) {
        let shared = SharedContext {
            config: self.config.clone(),
            transport: self.transport.clone(),
            recorder: self.recorder.clone(),
        };
        let user = VirtualUser::new(index, self.catalog.clone(), self.pacing, shared);
        let active = self.active.clone();

        users.spawn(async move {
            let _running = active.enter();
            user.run(stop).await
        });
    }
}
