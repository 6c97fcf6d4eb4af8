use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Voice provider credentials and transport endpoint
///
/// The identifiers are optional here so that a missing value is reported by
/// `ConnectionManager::initialize` rather than failing the whole config load.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// Public (client-side) key issued by the voice provider
    pub public_key: Option<String>,

    /// Assistant/agent that conducts the interview
    pub assistant_id: Option<String>,

    /// NATS server URL for the live channel
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
}

/// Lifecycle tuning for interview sessions
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Delay after an end-of-interview request before completion is
    /// re-invoked as a backstop
    #[serde(default = "default_safety_timeout_ms")]
    pub safety_timeout_ms: u64,

    /// Capacity of the connection event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl SessionSettings {
    pub fn safety_timeout(&self) -> Duration {
        Duration::from_millis(self.safety_timeout_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            safety_timeout_ms: default_safety_timeout_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_safety_timeout_ms() -> u64 {
    2000
}

fn default_event_buffer() -> usize {
    256
}

impl Config {
    /// Load from a config file stem (any format the `config` crate knows),
    /// then apply `SCREENING__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SCREENING").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse config")
    }
}
