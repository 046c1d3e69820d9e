//! Scenario configuration loading and management.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vu_engine::EngineConfig;

/// Main test configuration loaded from YAML.
///
/// Engine settings sit at the top level of the file next to the scenario
/// fields, e.g.:
///
/// ```yaml
/// name: read-only
/// description: Browsing traffic without writes
/// base_url: http://localhost:5173
/// users: 50
/// spawn_rate: 5
/// duration_secs: 300
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub engine: EngineConfig,
    /// Seconds of traffic discarded from the results.
    #[serde(default)]
    pub warmup_secs: u64,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

fn default_name() -> String {
    "load-test".to_string()
}

/// Data the read-only traffic mix needs beyond the engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// User whose orders are listed; the behavior skips when unset.
    #[serde(default)]
    pub test_user_id: Option<String>,
    /// Build assets fetched after the landing page. Hashes change on
    /// every frontend release.
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,
}

fn default_assets() -> Vec<String> {
    vec![
        "/assets/AdminPanel-aP81Zvhg.js".to_string(),
        "/assets/Profile-PTXI4aGy.js".to_string(),
        "/assets/Imageservifood%20logo-DO8gzfSS.jpg".to_string(),
    ]
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            test_user_id: None,
            assets: default_assets(),
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: String::new(),
            engine: EngineConfig::default(),
            warmup_secs: 0,
            scenario: ScenarioConfig::default(),
        }
    }
}

impl TestConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TestConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.engine.validate()?;
        if let Some(id) = &self.scenario.test_user_id {
            let valid = !id.is_empty()
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                anyhow::bail!("test_user_id must be alphanumeric, '-' or '_': {id:?}");
            }
        }
        if let (Some(duration), true) = (self.engine.duration_secs, self.warmup_secs > 0) {
            if self.warmup_secs >= duration {
                anyhow::bail!("warmup_secs must be shorter than duration_secs");
            }
        }
        if self.scenario.assets.iter().any(|a| !a.starts_with('/')) {
            anyhow::bail!("asset paths must start with '/'");
        }
        Ok(())
    }
}
