//! The virtual user: one simulated actor's select / act / wait loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use crate::catalog::BehaviorCatalog;
use crate::pacing::Pacing;
use crate::session::{Session, SharedContext};

/// Lifecycle of a virtual user. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    Created,
    Running,
    Stopped,
}

/// Whether a user is currently in its think-time wait. Clones share the
/// flag, so it can be watched while the user runs.
#[derive(Debug, Clone, Default)]
pub struct Paced(Arc<AtomicBool>);

impl Paced {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self, paced: bool) {
        self.0.store(paced, Ordering::Relaxed);
    }
}

/// Summary of one user's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReport {
    pub index: u32,
    pub identity: Uuid,
    pub iterations: u64,
    pub requests: u64,
    pub failures: u64,
    pub elapsed: Duration,
    pub state: UserState,
}

/// A single simulated user.
pub struct VirtualUser {
    session: Session,
    catalog: Arc<BehaviorCatalog>,
    pacing: Pacing,
    max_iterations: Option<u64>,
    state: UserState,
    paced: Paced,
    iterations: u64,
}

impl VirtualUser {
    pub fn new(index: u32, catalog: Arc<BehaviorCatalog>, pacing: Pacing, shared: SharedContext) -> Self {
        let max_iterations = shared.config.iterations_per_user;
        Self {
            session: Session::new(index, shared),
            catalog,
            pacing,
            max_iterations,
            state: UserState::Created,
            paced: Paced::default(),
            iterations: 0,
        }
    }

    /// Stop on its own after `limit` behaviors.
    pub fn with_max_iterations(mut self, limit: Option<u64>) -> Self {
        self.max_iterations = limit;
        self
    }

    pub fn state(&self) -> UserState {
        self.state
    }

    /// Handle on the user's waiting flag.
    pub fn paced(&self) -> Paced {
        self.paced.clone()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Run until `cancel` fires or the iteration limit is reached.
    ///
    /// Cancellation is only observed between behaviors and during the
    /// think-time wait: a behavior that already started, including any
    /// request in flight, runs to completion first.
    pub async fn run(mut self, cancel: CancellationToken) -> UserReport {
        let span = info_span!(
            "user",
            index = self.session.index(),
            identity = %self.session.identity()
        );
        async move {
            let started = Instant::now();
            self.state = UserState::Running;
            self.session.setup();
            debug!("User started");

            self.run_loop(&cancel).await;

            self.state = UserState::Stopped;
            debug!(iterations = self.iterations, "User stopped");
            self.report(started.elapsed())
        }
        .instrument(span)
        .await
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) {
        loop {
            if cancel.is_cancelled() || self.limit_reached() {
                return;
            }

            let behavior = match self.catalog.select(self.session.rng()) {
                Ok(b) => b.clone(),
                Err(e) => {
                    // Populations refuse empty catalogs, so only a
                    // hand-built user can get here.
                    error!(error = %e, "No behavior to run");
                    return;
                }
            };

            behavior.execute(&mut self.session).await;
            self.iterations += 1;

            if self.limit_reached() {
                return;
            }

            let wait = self.pacing.next_wait(self.session.rng());
            self.paced.set(true);
            let stopped = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(wait) => false,
            };
            self.paced.set(false);
            if stopped {
                return;
            }
        }
    }

    fn limit_reached(&self) -> bool {
        self.max_iterations
            .is_some_and(|max| self.iterations >= max)
    }

    fn report(&self, elapsed: Duration) -> UserReport {
        UserReport {
            index: self.session.index(),
            identity: self.session.identity(),
            iterations: self.iterations,
            requests: self.session.requests(),
            failures: self.session.failures(),
            elapsed,
            state: self.state,
        }
    }
}
