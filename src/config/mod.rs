//! Configuration module for holmes-playbooks

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::integrations::holmes::{ApiFlavor, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::pipeline::ProfileOverrides;

pub const ENV_HOLMES_URL: &str = "HOLMES_URL";
pub const ENV_HOLMES_API: &str = "HOLMES_API";
pub const ENV_CLUSTER_NAME: &str = "CLUSTER_NAME";
pub const ENV_FINDINGS_WEBHOOK_URL: &str = "FINDINGS_WEBHOOK_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {message}")]
    InvalidEnv { name: String, message: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Diagnostic service configuration
    #[serde(default)]
    pub holmes: HolmesConfig,

    /// Cluster identification
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Finding delivery
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Per-playbook overrides, keyed by playbook name
    #[serde(default)]
    pub playbooks: HashMap<String, ProfileOverrides>,
}

/// Diagnostic service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolmesConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API flavour for playbooks that do not set their own
    #[serde(default)]
    pub api: Option<ApiFlavor>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Language the analysis is requested in
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_language() -> String {
    "Spanish".to_string()
}

impl Default for HolmesConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api: None,
            timeout_secs: default_timeout_secs(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster name shown in findings and sent as context
    #[serde(default)]
    pub name: Option<String>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook receiving every finding
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Also write findings to the log
    #[serde(default = "default_true")]
    pub log_findings: bool,

    /// Upper bound on one webhook delivery
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            log_findings: true,
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

impl Config {
    /// Cluster name, empty when unknown
    pub fn cluster_name(&self) -> &str {
        self.cluster.name.as_deref().unwrap_or_default()
    }

    /// Per-playbook overrides with the global API flavour filled in
    pub fn playbook_overrides(&self) -> HashMap<String, ProfileOverrides> {
        let Some(api) = self.holmes.api else {
            return self.playbooks.clone();
        };

        let mut overrides = self.playbooks.clone();
        for profile in crate::pipeline::PlaybookProfile::builtin() {
            let entry = overrides.entry(profile.name).or_default();
            entry.api.get_or_insert(api);
        }
        overrides
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_HOLMES_URL) {
            self.holmes.base_url = url;
        }
        if let Some(api) = lookup(ENV_HOLMES_API) {
            let api = api.parse().map_err(|message| ConfigError::InvalidEnv {
                name: ENV_HOLMES_API.to_string(),
                message,
            })?;
            self.holmes.api = Some(api);
        }
        if let Some(name) = lookup(ENV_CLUSTER_NAME) {
            self.cluster.name = Some(name);
        }
        if let Some(url) = lookup(ENV_FINDINGS_WEBHOOK_URL) {
            self.notify.webhook_url = Some(url);
        }
        Ok(())
    }
}

/// Get the config directory for holmes-playbooks
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("holmes-playbooks"))
        .unwrap_or_else(|| PathBuf::from(".holmes-playbooks"))
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Parse a config file
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from an explicit path, the default path, or defaults;
/// environment overrides are applied last
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                load_config_from(&default_path)?
            } else {
                Config::default()
            }
        }
    };

    config.apply_env()?;
    Ok(config)
}
