//! Error types for the virtual-user engine.

use thiserror::Error;

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that stop the engine before any virtual user runs.
///
/// Nothing on the request path produces one of these: HTTP failures are
/// classified into [`crate::RequestOutcome`] values and recorded instead.
#[derive(Debug, Error)]
pub enum EngineError {
    // === Configuration Errors ===
    #[error("Missing required configuration: {0}")]
    ConfigurationMissing(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Catalog Errors ===
    #[error("Behavior '{name}' has invalid weight {weight}; weights must be positive")]
    InvalidWeight { name: String, weight: u32 },

    #[error("Behavior already registered: {0}")]
    DuplicateBehavior(String),

    #[error("No behaviors registered")]
    NoBehaviorsRegistered,

    // === Pacing Errors ===
    #[error("Invalid wait range: min={min}s max={max}s")]
    InvalidRange { min: f64, max: f64 },

    // === Infrastructure Errors ===
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::HttpClient(err.to_string())
    }
}
