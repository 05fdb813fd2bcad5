use crate::config::RelayConfig;
use crate::relay::core::StreamRelay;
use crate::Result;

/// Builder for creating relays with custom configuration.
///
/// Starts from [`RelayConfig::default`]; call [`from_env`](Self::from_env) to
/// start from the process environment instead.
pub struct StreamRelayBuilder {
    config: RelayConfig,
}

impl StreamRelayBuilder {
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
        }
    }

    pub fn from_env() -> Self {
        Self {
            config: RelayConfig::from_env(),
        }
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Provider base URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn deployment(mut self, deployment_id: impl Into<String>) -> Self {
        self.config.deployment_id = deployment_id.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    /// Replace the built-in assistant persona.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn response_timeout_secs(mut self, secs: u64) -> Self {
        self.config.response_timeout_secs = secs;
        self
    }

    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.idle_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<StreamRelay> {
        StreamRelay::new(self.config)
    }
}

impl Default for StreamRelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
