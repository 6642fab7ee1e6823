//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use secrecy::SecretString;
use sonicforge_config::{
    Config, CredentialMode, CredentialsConfig, GenerationConfig, HealthConfig, ModelConfig, OutputFormat,
    ProviderConfig, ProviderParams, RetryPolicy, ServerConfig, WireProtocol,
};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig {
                        enabled: true,
                        ..HealthConfig::default()
                    },
                    ..ServerConfig::default()
                },
                generation: GenerationConfig {
                    attempt_timeout: Some("5s".to_owned()),
                    ..GenerationConfig::default()
                },
                telemetry: None,
            },
        }
    }

    /// Provider whose keys are tried in order
    pub fn with_pooled_provider(self, name: &str, protocol: WireProtocol, keys: &[&str], policy: RetryPolicy) -> Self {
        self.with_provider(name, protocol, Some(policy), Some(credentials(CredentialMode::Pooled, keys)))
    }

    /// Provider with one master key; `None` leaves it unresolved
    pub fn with_single_provider(self, name: &str, protocol: WireProtocol, key: Option<&str>) -> Self {
        let keys: Vec<&str> = key.into_iter().collect();
        self.with_provider(name, protocol, None, Some(credentials(CredentialMode::Single, &keys)))
    }

    /// Provider that takes no `Authorization` header
    pub fn with_public_provider(self, name: &str, protocol: WireProtocol) -> Self {
        self.with_provider(name, protocol, None, None)
    }

    fn with_provider(
        mut self,
        name: &str,
        protocol: WireProtocol,
        retry_policy: Option<RetryPolicy>,
        credentials: Option<CredentialsConfig>,
    ) -> Self {
        self.config.generation.providers.insert(
            name.to_owned(),
            ProviderConfig {
                protocol,
                retry_policy,
                credentials,
            },
        );
        self
    }

    /// Expose a model served by `provider` at `endpoint`
    pub fn with_model(self, id: &str, provider: &str, endpoint: &str) -> Self {
        self.with_model_params(id, provider, endpoint, ProviderParams::default())
    }

    /// Expose a model with default provider parameters
    pub fn with_model_params(mut self, id: &str, provider: &str, endpoint: &str, params: ProviderParams) -> Self {
        self.config.generation.models.insert(
            id.to_owned(),
            ModelConfig {
                provider: provider.to_owned(),
                endpoint: endpoint.to_owned(),
                remote_model: None,
                label: None,
                params,
            },
        );
        self
    }

    /// Set the per-attempt timeout (e.g. "500ms")
    pub fn with_attempt_timeout(mut self, timeout: &str) -> Self {
        self.config.generation.attempt_timeout = Some(timeout.to_owned());
        self
    }

    pub fn with_default_format(mut self, format: OutputFormat) -> Self {
        self.config.generation.default_format = format;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config.validate().expect("valid test configuration");
        self.config
    }
}

fn credentials(mode: CredentialMode, keys: &[&str]) -> CredentialsConfig {
    CredentialsConfig {
        mode,
        keys: keys.iter().map(|key| SecretString::from(*key)).collect(),
        env: None,
        max_numbered: 10,
    }
}
