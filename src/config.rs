//! Relay configuration.
//!
//! Sources are layered, later ones overriding earlier ones:
//! built-in defaults, an optional YAML file, then environment variables.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AZURE_OPENAI_ENDPOINT` | `endpoint` |
//! | `AZURE_OPENAI_API_KEY` | `api_key` |
//! | `AZURE_OPENAI_DEPLOYMENT` | `deployment_id` |
//! | `AZURE_OPENAI_API_VERSION` | `api_version` |
//! | `RELAY_RESPONSE_TIMEOUT_SECS` | `response_timeout_secs` |
//! | `RELAY_IDLE_TIMEOUT_SECS` | `idle_timeout_secs` |
//! | `RELAY_BIND_ADDR` | `bind_addr` |
//! | `RELAY_PROXY_URL` | `proxy_url` |

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_RESPONSE_TIMEOUT: &str = "RELAY_RESPONSE_TIMEOUT_SECS";
pub const ENV_IDLE_TIMEOUT: &str = "RELAY_IDLE_TIMEOUT_SECS";
pub const ENV_BIND_ADDR: &str = "RELAY_BIND_ADDR";
pub const ENV_PROXY_URL: &str = "RELAY_PROXY_URL";

/// Sampling parameters forwarded verbatim to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            temperature: 0.3,
            top_p: 0.95,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Provider credentials plus relay runtime knobs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the provider, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment_id: String,
    pub api_version: String,
    pub generation: GenerationParams,
    /// Replaces the built-in assistant persona when set.
    pub system_prompt: Option<String>,
    /// Upper bound on waiting for the provider's response headers.
    pub response_timeout_secs: u64,
    /// Upper bound on waiting for the next upstream read once streaming.
    pub idle_timeout_secs: u64,
    pub bind_addr: String,
    pub proxy_url: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment_id: "gpt-4o".to_string(),
            api_version: "2024-02-15-preview".to_string(),
            generation: GenerationParams::default(),
            system_prompt: None,
            response_timeout_secs: 30,
            idle_timeout_secs: 60,
            bind_addr: "0.0.0.0:3000".to_string(),
            proxy_url: None,
        }
    }
}

// Keeps the API key out of logs.
impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("deployment_id", &self.deployment_id)
            .field("api_version", &self.api_version)
            .field("generation", &self.generation)
            .field("system_prompt", &self.system_prompt.is_some())
            .field("response_timeout_secs", &self.response_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("bind_addr", &self.bind_addr)
            .field("proxy_url", &self.proxy_url)
            .finish()
    }
}

impl RelayConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_with(|key| std::env::var(key).ok());
        cfg
    }

    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid YAML configuration: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })
    }

    /// Load from an optional YAML file, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Self::from_yaml_str(&raw)?
            }
            None => Self::default(),
        };
        cfg.apply_env_with(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Apply overrides from an arbitrary key lookup (the environment in production).
    ///
    /// Blank values are ignored, as are numeric values that fail to parse.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ENDPOINT) {
            self.endpoint = Some(v);
        }
        if let Some(v) = get(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = get(ENV_DEPLOYMENT) {
            self.deployment_id = v;
        }
        if let Some(v) = get(ENV_API_VERSION) {
            self.api_version = v;
        }
        if let Some(v) = get(ENV_RESPONSE_TIMEOUT).and_then(|s| s.trim().parse::<u64>().ok()) {
            self.response_timeout_secs = v;
        }
        if let Some(v) = get(ENV_IDLE_TIMEOUT).and_then(|s| s.trim().parse::<u64>().ok()) {
            self.idle_timeout_secs = v;
        }
        if let Some(v) = get(ENV_BIND_ADDR) {
            self.bind_addr = v;
        }
        if let Some(v) = get(ENV_PROXY_URL) {
            self.proxy_url = Some(v);
        }
    }

    /// Check that the relay can operate with this configuration.
    pub fn validate(&self) -> Result<()> {
        let api_key = self.api_key.as_deref().unwrap_or("").trim();
        if api_key.is_empty() {
            return Err(Error::configuration_with_context(
                format!("{} environment variable is not defined", ENV_API_KEY),
                ErrorContext::new()
                    .with_field_path("api_key")
                    .with_source("config_validator"),
            ));
        }

        let endpoint = self.endpoint.as_deref().unwrap_or("").trim();
        if endpoint.is_empty() {
            return Err(Error::configuration_with_context(
                format!("{} environment variable is not defined", ENV_ENDPOINT),
                ErrorContext::new()
                    .with_field_path("endpoint")
                    .with_source("config_validator"),
            ));
        }
        let parsed = url::Url::parse(endpoint).map_err(|e| {
            Error::configuration_with_context(
                format!("endpoint is not a valid URL: {}", e),
                ErrorContext::new()
                    .with_field_path("endpoint")
                    .with_details(endpoint.to_string())
                    .with_source("config_validator"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                format!("unsupported endpoint scheme '{}'", parsed.scheme()),
                ErrorContext::new()
                    .with_field_path("endpoint")
                    .with_details("expected http or https")
                    .with_source("config_validator"),
            ));
        }

        for (field, value) in [
            ("deployment_id", &self.deployment_id),
            ("api_version", &self.api_version),
        ] {
            if value.trim().is_empty() {
                return Err(Error::configuration_with_context(
                    format!("{} must not be empty", field),
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("config_validator"),
                ));
            }
        }

        if self.response_timeout_secs == 0 || self.idle_timeout_secs == 0 {
            return Err(Error::configuration_with_context(
                "timeouts must be greater than zero",
                ErrorContext::new()
                    .with_field_path("response_timeout_secs")
                    .with_source("config_validator"),
            ));
        }

        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
