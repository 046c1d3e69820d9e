//! Think-time between a virtual user's successive behaviors.

use std::time::Duration;

use rand::Rng;

use crate::error::{EngineError, EngineResult};

/// Draw a wait uniformly from `[min_secs, max_secs]`.
///
/// Fails with [`EngineError::InvalidRange`] when either bound is negative,
/// not finite or too large for a [`Duration`], or when `min_secs > max_secs`.
pub fn delay<R: Rng + ?Sized>(rng: &mut R, min_secs: f64, max_secs: f64) -> EngineResult<Duration> {
    check_range(min_secs, max_secs)?;
    Ok(Duration::from_secs_f64(draw(rng, min_secs, max_secs)))
}

fn check_range(min_secs: f64, max_secs: f64) -> EngineResult<()> {
    let bad = !min_secs.is_finite()
        || !max_secs.is_finite()
        || min_secs < 0.0
        || max_secs < 0.0
        || min_secs > max_secs
        || Duration::try_from_secs_f64(max_secs).is_err();
    if bad {
        return Err(EngineError::InvalidRange {
            min: min_secs,
            max: max_secs,
        });
    }
    Ok(())
}

fn draw<R: Rng + ?Sized>(rng: &mut R, min_secs: f64, max_secs: f64) -> f64 {
    if min_secs == max_secs {
        return min_secs;
    }
    rng.gen_range(min_secs..=max_secs)
}

/// A validated `[min, max]` wait interval, checked once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    min_secs: f64,
    max_secs: f64,
}

impl Pacing {
    /// Create a pacing policy; the range is validated here so that
    /// [`Pacing::next_wait`] cannot fail inside the user loop.
    pub fn between(min_secs: f64, max_secs: f64) -> EngineResult<Self> {
        check_range(min_secs, max_secs)?;
        Ok(Self { min_secs, max_secs })
    }

    /// Pacing with no wait at all.
    pub fn none() -> Self {
        Self {
            min_secs: 0.0,
            max_secs: 0.0,
        }
    }

    pub fn min_secs(&self) -> f64 {
        self.min_secs
    }

    pub fn max_secs(&self) -> f64 {
        self.max_secs
    }

    /// Next wait duration for a user.
    pub fn next_wait<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs_f64(draw(rng, self.min_secs, self.max_secs))
    }
}
