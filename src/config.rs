//! Worker configuration (§10.3): TOML file layered with environment
//! overrides via the `config` crate. Config errors are distinct from the
//! job-facing [`ErrorKind`] taxonomy (§7) — they fail bootstrap before any
//! job is ever seen.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration value out of range: {0}")]
    Invalid(String),
}

/// Per-task pool knobs (§4.7, §10.3).
#[derive(Debug, Clone, Deserialize)]
pub struct TaskPoolConfig {
    pub task_type: String,
    #[serde(default = "default_max_jobs_active")]
    pub max_jobs_active: usize,
    #[serde(default = "default_activation_timeout_ms")]
    pub activation_timeout_ms: u64,
    #[serde(default = "default_execute_timeout_ms")]
    pub execute_timeout_ms: u64,
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl TaskPoolConfig {
    pub fn activation_timeout(&self) -> Duration {
        Duration::from_millis(self.activation_timeout_ms)
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_millis(self.execute_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

fn default_max_jobs_active() -> usize {
    10
}

fn default_activation_timeout_ms() -> u64 {
    10_000
}

fn default_execute_timeout_ms() -> u64 {
    10_000
}

fn default_drain_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct FastStoreConfig {
    pub url: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemOfRecordConfig {
    pub connection_string: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateRegistryConfig {
    pub document_path: String,
    #[serde(default = "default_template_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_template_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub relay: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub starttls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub base_url: String,
}

/// Top-level worker configuration (§10.3).
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub version: String,
    pub worker_id: String,
    pub tasks: Vec<TaskPoolConfig>,
    pub fast_store: FastStoreConfig,
    pub system_of_record: SystemOfRecordConfig,
    pub template_registry: TemplateRegistryConfig,
    pub smtp: SmtpConfig,
    pub search: SearchConfig,
}

impl WorkerConfig {
    /// Load `<path>` (if present) then overlay `JOBWORKER_*` environment
    /// variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("JOBWORKER").separator("__"))
            .build()?;

        built.try_deserialize().map_err(ConfigError::from)
    }
}
