//! Configuration management for the approval workflow

use crate::error::{MaharatError, Result};
use approval_types::LinkedFamily;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `MAHARAT__API__TOKEN`
pub const ENV_PREFIX: &str = "MAHARAT";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaharatConfig {
    pub api: ApiConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub inbox: InboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(alias = "url")]     // Accept both 'base_url' and 'url'
    pub base_url: String,

    #[serde(alias = "api_key")]  // Accept both 'token' and 'api_key'
    pub token: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Urgency given to every task created by an advancement
    #[serde(default = "default_urgency")]
    pub urgency: String,

    /// Process title overrides keyed by family name (`purchase_order`, `rfq`, ...)
    #[serde(default)]
    pub process_titles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxConfig {
    #[serde(default = "default_inbox_root")]
    pub root: PathBuf,
}

// Default functions
fn default_timeout_secs() -> u64 {
    30
}

fn default_urgency() -> String {
    "Normal".to_string()
}

fn default_inbox_root() -> PathBuf {
    PathBuf::from(crate::paths::DEFAULT_REVIEWS_ROOT)
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            urgency: default_urgency(),
            process_titles: BTreeMap::new(),
        }
    }
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            root: default_inbox_root(),
        }
    }
}

impl WorkflowConfig {
    /// Title of the process defining `family`'s steps, honouring overrides
    pub fn process_title(&self, family: LinkedFamily) -> &str {
        self.process_titles
            .get(family.as_str())
            .map(|s| s.as_str())
            .unwrap_or_else(|| family.process_title())
    }
}

impl MaharatConfig {
    /// Load configuration from a JSON file, with `MAHARAT__*` environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MaharatError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Json).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: MaharatConfig = settings.try_deserialize()?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MaharatConfig = serde_json::from_str(json)
            .map_err(|e| MaharatError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(MaharatError::Config("API base_url is required".to_string()));
        }

        if self.api.token.trim().is_empty() {
            return Err(MaharatError::Config("API token is required".to_string()));
        }

        if self.api.timeout_secs == 0 {
            return Err(MaharatError::Config("API timeout_secs must be positive".to_string()));
        }

        if self.workflow.urgency.trim().is_empty() {
            return Err(MaharatError::Config("Workflow urgency must not be empty".to_string()));
        }

        for (key, title) in &self.workflow.process_titles {
            key.parse::<LinkedFamily>()
                .map_err(|e| MaharatError::Config(format!("Invalid process_titles key: {}", e)))?;
            if title.trim().is_empty() {
                return Err(MaharatError::Config(format!(
                    "Process title override for '{}' is empty",
                    key
                )));
            }
        }

        Ok(())
    }
}
