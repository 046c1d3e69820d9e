//! Engine configuration loading and validation.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::pacing::Pacing;

/// Immutable run configuration, built once at startup and shared by every
/// virtual user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Target host for page and asset requests. Required.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Backing REST data API. Behaviors that need it skip when absent.
    #[serde(default)]
    pub rest_api_url: Option<String>,
    /// Credential for the REST data API.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Highest page index, inclusive.
    #[serde(default = "default_max_page")]
    pub max_page: u32,
    /// Think-time bounds in seconds.
    #[serde(default = "default_min_wait")]
    pub min_wait: f64,
    #[serde(default = "default_max_wait")]
    pub max_wait: f64,
    /// Target number of concurrent virtual users.
    #[serde(default = "default_users")]
    pub users: u32,
    /// Users started per second while ramping up.
    #[serde(default = "default_spawn_rate")]
    pub spawn_rate: f64,
    /// Stop the run after this many seconds.
    #[serde(default)]
    pub duration_secs: Option<u64>,
    /// Each user stops after this many behaviors.
    #[serde(default)]
    pub iterations_per_user: Option<u64>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Count 401/403 as failures.
    #[serde(default = "default_unauthorized_is_failure")]
    pub unauthorized_is_failure: bool,
    /// Optional RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_page_size() -> u32 {
    50
}

fn default_max_page() -> u32 {
    4
}

fn default_min_wait() -> f64 {
    0.5
}

fn default_max_wait() -> f64 {
    2.0
}

fn default_users() -> u32 {
    10
}

fn default_spawn_rate() -> f64 {
    1.0
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_unauthorized_is_failure() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            rest_api_url: None,
            api_key: None,
            page_size: default_page_size(),
            max_page: default_max_page(),
            min_wait: default_min_wait(),
            max_wait: default_max_wait(),
            users: default_users(),
            spawn_rate: default_spawn_rate(),
            duration_secs: None,
            iterations_per_user: None,
            request_timeout_secs: default_request_timeout_secs(),
            unauthorized_is_failure: default_unauthorized_is_failure(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Defaults pointed at `base_url`.
    pub fn for_target(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> EngineResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validate configuration. Called before any virtual user starts.
    pub fn validate(&self) -> EngineResult<()> {
        self.target_base_url()?;
        self.pacing()?;
        if self.users == 0 {
            return Err(EngineError::InvalidConfig("users must be > 0".into()));
        }
        self.spawn_interval()?;
        if self.page_size == 0 {
            return Err(EngineError::InvalidConfig("page_size must be > 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "request_timeout_secs must be > 0".into(),
            ));
        }
        if self.duration_secs == Some(0) {
            return Err(EngineError::InvalidConfig("duration_secs must be > 0".into()));
        }
        if let Some(api) = self.data_api() {
            api.headers()?;
        }
        Ok(())
    }

    /// The required target host, trimmed of trailing slashes.
    pub fn target_base_url(&self) -> EngineResult<&str> {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url.trim_end_matches('/')),
            _ => Err(EngineError::ConfigurationMissing("base_url")),
        }
    }

    pub fn pacing(&self) -> EngineResult<Pacing> {
        Pacing::between(self.min_wait, self.max_wait)
    }

    /// Delay between two user starts during the ramp.
    pub fn spawn_interval(&self) -> EngineResult<Duration> {
        if !(self.spawn_rate.is_finite() && self.spawn_rate > 0.0) {
            return Err(EngineError::InvalidConfig("spawn_rate must be > 0".into()));
        }
        Duration::try_from_secs_f64(1.0 / self.spawn_rate).map_err(|_| {
            EngineError::InvalidConfig(format!("spawn_rate {} is too small", self.spawn_rate))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// REST data API settings, or `None` when either the URL or the key is
    /// missing; dependent behaviors then skip their requests.
    pub fn data_api(&self) -> Option<DataApi> {
        let url = self.rest_api_url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let key = self.api_key.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(DataApi {
            base_url: url.trim_end_matches('/').to_string(),
            api_key: key.to_string(),
        })
    }

    pub fn is_degraded(&self) -> bool {
        self.data_api().is_none()
    }
}

/// Connection details for the REST data API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataApi {
    pub base_url: String,
    pub api_key: String,
}

impl DataApi {
    /// Session headers derived from the API key.
    pub fn headers(&self) -> EngineResult<HeaderMap> {
        let invalid = |_| EngineError::InvalidConfig("api_key is not a valid header value".into());

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.api_key).map_err(invalid)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(invalid)?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("prefer", HeaderValue::from_static("count=none"));
        Ok(headers)
    }

    /// Absolute URL for a path on the data API.
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config = EngineConfig::from_yaml("base_url: http://localhost:5173\n").unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_page, 4);
        assert_eq!(config.min_wait, 0.5);
        assert_eq!(config.max_wait, 2.0);
        assert!(config.unauthorized_is_failure);
        assert!(config.validate().is_ok());
        assert!(config.is_degraded());
    }

    #[test]
    fn test_missing_base_url() {
        let config = EngineConfig::default();
        assert!(matches!(
            config.validate(),
            Err(EngineError::ConfigurationMissing("base_url"))
        ));

        let blank = EngineConfig::for_target("   ");
        assert!(matches!(
            blank.validate(),
            Err(EngineError::ConfigurationMissing(_))
        ));
    }

    #[test]
    fn test_invalid_wait_range() {
        let config = EngineConfig {
            min_wait: 3.0,
            max_wait: 1.0,
            ..EngineConfig::for_target("http://localhost")
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_huge_max_wait_rejected() {
        let config = EngineConfig {
            max_wait: 1e30,
            iterations_per_user: Some(3),
            ..EngineConfig::for_target("http://localhost")
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_tiny_spawn_rate_rejected() {
        let mut config = EngineConfig::for_target("http://localhost");
        config.spawn_rate = 1e-30;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));

        config.spawn_rate = 4.0;
        assert_eq!(config.spawn_interval().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_population() {
        let mut config = EngineConfig::for_target("http://localhost");
        config.users = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::for_target("http://localhost");
        config.spawn_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::for_target("http://localhost");
        config.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_api_requires_url_and_key() {
        let mut config = EngineConfig::for_target("http://localhost");
        config.rest_api_url = Some("https://db.example.com/rest/v1/".into());
        assert!(config.data_api().is_none());

        config.api_key = Some("anon-key".into());
        let api = config.data_api().unwrap();
        assert_eq!(api.base_url, "https://db.example.com/rest/v1");
        assert_eq!(api.url("/orders?select=id"), "https://db.example.com/rest/v1/orders?select=id");
        assert!(!config.is_degraded());
    }

    #[test]
    fn test_data_api_headers() {
        let api = DataApi {
            base_url: "https://db.example.com".into(),
            api_key: "k123".into(),
        };
        let headers = api.headers().unwrap();
        assert_eq!(headers.get("apikey").unwrap(), "k123");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer k123");
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(headers.get("prefer").unwrap(), "count=none");
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let mut config = EngineConfig::for_target("http://localhost");
        config.rest_api_url = Some("https://db.example.com".into());
        config.api_key = Some("bad\nkey".into());
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_target_base_url_trimmed() {
        let config = EngineConfig::for_target("http://localhost:8080/");
        assert_eq!(config.target_base_url().unwrap(), "http://localhost:8080");
        assert_eq!(join_url("http://a/", "/b"), "http://a/b");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(
            &path,
            "base_url: http://localhost\nusers: 25\nspawn_rate: 5\nduration_secs: 60\n",
        )
        .unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.users, 25);
        assert_eq!(config.spawn_rate, 5.0);
        assert_eq!(config.duration_secs, Some(60));
    }
}
