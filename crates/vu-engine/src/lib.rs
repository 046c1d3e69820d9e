//! Virtual-user simulation engine for synthetic HTTP load.
//!
//! This crate provides:
//! - A catalog of named, weighted behaviors with weighted random selection
//! - Randomized think-time pacing between behaviors
//! - Classification of responses into success / failure outcomes
//! - Virtual users that loop select → act → wait until stopped
//! - A population manager that ramps users up and aggregates outcomes
//!
//! The HTTP transport and the outcome recorder are seams ([`Transport`],
//! [`Recorder`]); [`ReqwestTransport`] and [`MetricsCollector`] are the
//! defaults.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pacing;
pub mod population;
pub mod session;
pub mod transport;
pub mod user;
pub mod window;

pub use catalog::{Action, Behavior, BehaviorCatalog};
pub use classify::{classify, classify_response, FailureReason, RequestOutcome};
pub use config::{DataApi, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use metrics::{MetricsCollector, NullRecorder, OperationResults, Recorder, TestResults};
pub use pacing::{delay, Pacing};
pub use population::{ActiveUsers, Population, PopulationReport};
pub use session::{Session, SharedContext};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use user::{Paced, UserReport, UserState, VirtualUser};
pub use window::PageWindow;

// Re-exported so behavior modules don't need their own futures dependency
pub use futures::future::BoxFuture;
