//! Named, weighted behaviors and weighted random selection.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use rand::Rng;

use crate::error::{EngineError, EngineResult};
use crate::session::Session;

/// What a behavior does when selected.
///
/// Implemented for any `Fn(&mut Session) -> BoxFuture<'_, ()>`, so plain
/// async helper functions can be registered directly:
///
/// ```ignore
/// fn home(session: &mut Session) -> BoxFuture<'_, ()> {
///     Box::pin(async move {
///         session.get("/", "GET /").await;
///     })
/// }
/// ```
pub trait Action: Send + Sync {
    fn run<'a>(&'a self, session: &'a mut Session) -> BoxFuture<'a, ()>;
}

impl<F> Action for F
where
    F: for<'s> Fn(&'s mut Session) -> BoxFuture<'s, ()> + Send + Sync,
{
    fn run<'a>(&'a self, session: &'a mut Session) -> BoxFuture<'a, ()> {
        self(session)
    }
}

/// A named unit of simulated user activity with a relative weight.
#[derive(Clone)]
pub struct Behavior {
    name: String,
    weight: u32,
    action: Arc<dyn Action>,
}

impl Behavior {
    pub fn new(name: impl Into<String>, weight: u32, action: impl Action + 'static) -> Self {
        Self {
            name: name.into(),
            weight,
            action: Arc::new(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Run the behavior's action against a user's session.
    pub async fn execute(&self, session: &mut Session) {
        self.action.run(session).await
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// Behaviors in registration order, with their cumulative weights.
#[derive(Debug, Clone, Default)]
pub struct BehaviorCatalog {
    behaviors: Vec<Behavior>,
    cumulative: Vec<u64>,
}

impl BehaviorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a behavior. Weights must be positive and names unique.
    pub fn register(&mut self, behavior: Behavior) -> EngineResult<()> {
        if behavior.weight == 0 {
            return Err(EngineError::InvalidWeight {
                name: behavior.name,
                weight: behavior.weight,
            });
        }
        if self.behaviors.iter().any(|b| b.name == behavior.name) {
            return Err(EngineError::DuplicateBehavior(behavior.name));
        }

        let total = self.total_weight() + u64::from(behavior.weight);
        self.cumulative.push(total);
        self.behaviors.push(behavior);
        Ok(())
    }

    /// Builder-style [`BehaviorCatalog::register`].
    pub fn with(mut self, behavior: Behavior) -> EngineResult<Self> {
        self.register(behavior)?;
        Ok(self)
    }

    /// Pick a behavior with probability `weight / total_weight`.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> EngineResult<&Behavior> {
        let idx = weighted_pick(rng, &self.cumulative).ok_or(EngineError::NoBehaviorsRegistered)?;
        Ok(&self.behaviors[idx])
    }

    pub fn total_weight(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Behavior> {
        self.behaviors.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Behavior> {
        self.behaviors.iter().find(|b| b.name == name)
    }

    /// Expected selection share of `name` in `[0, 1]`.
    pub fn share(&self, name: &str) -> Option<f64> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        self.get(name)
            .map(|b| f64::from(b.weight) / total as f64)
    }
}

/// Draw uniformly from `[0, total)` and walk the cumulative weights.
/// `None` when there is nothing to pick from.
pub(crate) fn weighted_pick<R: Rng + ?Sized>(rng: &mut R, cumulative: &[u64]) -> Option<usize> {
    let total = cumulative.last().copied().filter(|&t| t > 0)?;
    pick_cumulative(cumulative, rng.gen_range(0..total))
}

/// Walk cumulative weights until the running sum exceeds `draw`.
fn pick_cumulative(cumulative: &[u64], draw: u64) -> Option<usize> {
    cumulative.iter().position(|&cum| cum > draw)
}
